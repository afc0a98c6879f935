/// Capability interface between the catalog and the operating system.
///
/// The catalog only sees this trait, so the filtering and path-resolution
/// pipeline is portable and runs against [`fake::FakeBackend`] in tests.
/// The Windows implementation is `platform::NativeBackend`.
pub mod fake;

use crate::error::HandleError;
use crate::model::{HandleRef, HandleTableEntry};
use crate::nt::{classify_name_status, NameStatus, NtStatus, ObjectTypeRegistry};
use crate::ntpath::NtPathTable;
use std::time::Duration;

/// Why an entry was skipped at the duplication step. Never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The owning process could not be opened (protected or already exited).
    ProcessUnavailable,
    /// The handle type cannot be duplicated.
    NotSupported,
    /// The handle was closed before it could be duplicated.
    InvalidHandle,
    /// Duplication was refused.
    AccessDenied,
    /// Any other duplication failure.
    Other,
}

/// Result of duplicating one remote handle into the current process.
#[derive(Debug)]
pub enum Duplication<H> {
    /// A local reference to the same object, released when dropped.
    Duplicated(H),
    Skipped(SkipReason),
}

/// Why a name query produced no name. Never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unnamed {
    /// The object has no queryable name (unsupported, bad path, pending).
    Ignorable(NtStatus),
    /// The query did not finish within the timeout and was abandoned.
    TimedOut,
    AccessDenied,
    /// The query succeeded with an empty name.
    Empty,
}

/// Result of querying the name of a duplicated handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameQuery {
    Named(String),
    Unnamed(Unnamed),
}

impl NameQuery {
    /// Translate the exit status of a completed query. `decode` reads the
    /// output buffer and is only called on success.
    pub fn from_status(
        status: NtStatus,
        decode: impl FnOnce() -> Result<Option<String>, HandleError>,
    ) -> Result<Self, HandleError> {
        Ok(match classify_name_status(status)? {
            NameStatus::Complete => match decode()? {
                Some(name) => Self::Named(name),
                None => Self::Unnamed(Unnamed::Empty),
            },
            NameStatus::Ignorable => Self::Unnamed(Unnamed::Ignorable(status)),
            NameStatus::AccessDenied => Self::Unnamed(Unnamed::AccessDenied),
        })
    }
}

/// Operating-system capabilities needed for handle discovery.
pub trait HandleBackend {
    /// Locally owned duplicate of a remote handle. Dropping it releases the
    /// handle.
    type Local;

    /// Capture the system-wide handle table, in table order.
    fn enumerate_handles(&self) -> Result<Vec<HandleTableEntry>, HandleError>;

    /// Object type index → name lookup.
    fn object_types(&self) -> Result<&ObjectTypeRegistry, HandleError>;

    /// Current device-prefix → drive-letter table.
    fn device_map(&self) -> Result<NtPathTable, HandleError>;

    /// Duplicate `entry`'s handle into the current process with the access it
    /// already holds. Failures that only concern this entry are
    /// [`Duplication::Skipped`].
    fn duplicate_handle(
        &self,
        entry: &HandleTableEntry,
    ) -> Result<Duplication<Self::Local>, HandleError>;

    /// Query the object name behind `local`, abandoning the query after
    /// `timeout`.
    fn query_object_name_with_timeout(
        &mut self,
        local: &Self::Local,
        timeout: Duration,
    ) -> Result<NameQuery, HandleError>;

    /// Close `target` inside its owning process.
    fn close_remote_handle(&self, target: &HandleRef) -> Result<(), HandleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_decodes_name() {
        let q = NameQuery::from_status(NtStatus::SUCCESS, || Ok(Some(r"\Device\X".into())));
        assert_eq!(q.unwrap(), NameQuery::Named(r"\Device\X".into()));
    }

    #[test]
    fn test_success_with_empty_name() {
        let q = NameQuery::from_status(NtStatus::SUCCESS, || Ok(None)).unwrap();
        assert_eq!(q, NameQuery::Unnamed(Unnamed::Empty));
    }

    #[test]
    fn test_failure_never_decodes() {
        let q = NameQuery::from_status(NtStatus::NOT_SUPPORTED, || {
            panic!("buffer must not be read after a failed query")
        })
        .unwrap();
        assert_eq!(
            q,
            NameQuery::Unnamed(Unnamed::Ignorable(NtStatus::NOT_SUPPORTED))
        );

        let q = NameQuery::from_status(NtStatus::ACCESS_DENIED, || Ok(None)).unwrap();
        assert_eq!(q, NameQuery::Unnamed(Unnamed::AccessDenied));
    }

    #[test]
    fn test_unexpected_status_propagates() {
        let q = NameQuery::from_status(NtStatus::INFO_LENGTH_MISMATCH, || Ok(None));
        assert!(matches!(q, Err(HandleError::NameQuery { .. })));
    }
}
