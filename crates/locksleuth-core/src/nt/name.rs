/// Object name decoding and name-query status classification.
use crate::error::HandleError;
use crate::nt::layout::Layout;
use crate::nt::NtStatus;

/// How a name-query status should be treated by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStatus {
    /// The output buffer holds a name.
    Complete,
    /// The object has no queryable name; drop the entry.
    Ignorable,
    /// The caller may not query this object; drop the entry.
    AccessDenied,
}

/// Classify the exit status of a name query.
///
/// Statuses outside the known set are fatal: they indicate the engine itself
/// is misbehaving rather than one odd handle.
pub fn classify_name_status(status: NtStatus) -> Result<NameStatus, HandleError> {
    match status {
        NtStatus::SUCCESS => Ok(NameStatus::Complete),
        NtStatus::NOT_SUPPORTED
        | NtStatus::OBJECT_PATH_INVALID
        | NtStatus::OBJECT_PATH_SYNTAX_BAD
        | NtStatus::TIMEOUT
        | NtStatus::PENDING => Ok(NameStatus::Ignorable),
        NtStatus::ACCESS_DENIED => Ok(NameStatus::AccessDenied),
        other => Err(HandleError::NameQuery { status: other }),
    }
}

/// Decode an `OBJECT_NAME_INFORMATION` buffer.
///
/// `base` is the address of `bytes[0]` as seen by the query routine.
/// Trailing NUL padding is trimmed; an empty name yields `Ok(None)`.
pub fn decode_object_name(
    bytes: &[u8],
    base: u64,
    layout: Layout,
) -> Result<Option<String>, HandleError> {
    layout.read_unicode_string(bytes, 0, base, "object name")
}
