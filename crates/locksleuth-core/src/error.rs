/// Error type for the handle discovery engine.
///
/// Only conditions that abort a whole enumeration pass are errors. Per-entry
/// outcomes (a protected process, a handle that vanished, a name query that
/// timed out) are ordinary values of [`crate::backend::Duplication`] and
/// [`crate::backend::NameQuery`] and never surface here.
use crate::nt::NtStatus;

/// Fatal failure of a discovery or close operation.
#[derive(thiserror::Error, Debug)]
pub enum HandleError {
    /// The system handle table could not be captured.
    #[error("system handle snapshot failed: NTSTATUS {status}")]
    Snapshot { status: NtStatus },

    /// The object type table could not be captured.
    #[error("object type query failed: NTSTATUS {status}")]
    ObjectTypes { status: NtStatus },

    /// The name query returned a status outside the known ignorable set.
    #[error("object name query failed: NTSTATUS {status}")]
    NameQuery { status: NtStatus },

    /// A kernel-filled buffer did not have the expected shape.
    #[error("malformed {what} buffer at offset {offset}")]
    Malformed { what: &'static str, offset: usize },

    /// No stub encoding exists for the running architecture.
    #[error("unsupported architecture: {0}")]
    UnsupportedArchitecture(&'static str),

    /// A Win32 API call failed.
    #[error("{api} failed: {message}")]
    Win32 { api: &'static str, message: String },
}

impl HandleError {
    /// Shorthand for a [`HandleError::Malformed`] value.
    pub(crate) fn malformed(what: &'static str, offset: usize) -> Self {
        Self::Malformed { what, offset }
    }

    /// Build a [`HandleError::Win32`] from any displayable OS error.
    pub fn win32(api: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Win32 {
            api,
            message: err.to_string(),
        }
    }
}
