/// Handle duplication into the current process, and remote close.
use super::handle::OwnedHandle;
use crate::backend::{Duplication, SkipReason};
use crate::error::HandleError;
use crate::model::{HandleRef, HandleTableEntry};
use tracing::{debug, warn};
use windows::Win32::Foundation::{
    DuplicateHandle, DUPLICATE_CLOSE_SOURCE, DUPLICATE_SAME_ACCESS, ERROR_ACCESS_DENIED,
    ERROR_INVALID_HANDLE, ERROR_NOT_SUPPORTED, HANDLE,
};
use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcess, PROCESS_DUP_HANDLE};

fn open_owner(process_id: u32) -> windows::core::Result<OwnedHandle> {
    // SAFETY: plain FFI call; the returned handle is owned by us.
    let process = unsafe { OpenProcess(PROCESS_DUP_HANDLE, false, process_id)? };
    // SAFETY: freshly opened above.
    Ok(unsafe { OwnedHandle::from_raw(process) })
}

fn remote_handle(handle_value: usize) -> HANDLE {
    HANDLE(handle_value as *mut _)
}

fn skip_reason(err: &windows::core::Error) -> Option<SkipReason> {
    let code = err.code();
    if code == ERROR_NOT_SUPPORTED.to_hresult() {
        Some(SkipReason::NotSupported)
    } else if code == ERROR_INVALID_HANDLE.to_hresult() {
        Some(SkipReason::InvalidHandle)
    } else if code == ERROR_ACCESS_DENIED.to_hresult() {
        Some(SkipReason::AccessDenied)
    } else {
        None
    }
}

/// Duplicate `entry`'s handle into this process with its granted access.
///
/// Every per-entry failure is a skip. Failures outside the expected set are
/// logged at `warn` so they can be investigated.
pub fn duplicate_into_current(
    entry: &HandleTableEntry,
) -> Result<Duplication<OwnedHandle>, HandleError> {
    let process = match open_owner(entry.process_id) {
        Ok(p) => p,
        Err(e) => {
            debug!(pid = entry.process_id, "OpenProcess failed: {e}");
            return Ok(Duplication::Skipped(SkipReason::ProcessUnavailable));
        }
    };

    let mut local = HANDLE::default();
    // SAFETY: `process` is open with PROCESS_DUP_HANDLE and `local` is a
    // valid out pointer.
    let result = unsafe {
        DuplicateHandle(
            process.raw(),
            remote_handle(entry.handle_value),
            GetCurrentProcess(),
            &mut local,
            0,
            false,
            DUPLICATE_SAME_ACCESS,
        )
    };

    match result {
        // SAFETY: DuplicateHandle succeeded, so `local` is ours to close.
        Ok(()) => Ok(Duplication::Duplicated(unsafe { OwnedHandle::from_raw(local) })),
        Err(e) => {
            let reason = skip_reason(&e).unwrap_or_else(|| {
                warn!(
                    pid = entry.process_id,
                    handle = entry.handle_value,
                    "DuplicateHandle failed unexpectedly: {e}"
                );
                SkipReason::Other
            });
            Ok(Duplication::Skipped(reason))
        }
    }
}

/// Close `target` inside its owning process.
pub fn close_remote(target: &HandleRef) -> Result<(), HandleError> {
    let process =
        open_owner(target.process_id).map_err(|e| HandleError::win32("OpenProcess", e))?;

    // SAFETY: DUPLICATE_CLOSE_SOURCE with no target process closes the
    // source handle and creates nothing, so the null out pointer is allowed.
    unsafe {
        DuplicateHandle(
            process.raw(),
            remote_handle(target.handle_value),
            HANDLE::default(),
            std::ptr::null_mut(),
            0,
            false,
            DUPLICATE_CLOSE_SOURCE,
        )
    }
    .map_err(|e| HandleError::win32("DuplicateHandle", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::Foundation::ERROR_FILE_NOT_FOUND;

    fn error(code: windows::Win32::Foundation::WIN32_ERROR) -> windows::core::Error {
        windows::core::Error::from(code.to_hresult())
    }

    #[test]
    fn test_known_failures_are_skip_reasons() {
        assert_eq!(
            skip_reason(&error(ERROR_ACCESS_DENIED)),
            Some(SkipReason::AccessDenied)
        );
        assert_eq!(
            skip_reason(&error(ERROR_NOT_SUPPORTED)),
            Some(SkipReason::NotSupported)
        );
        assert_eq!(
            skip_reason(&error(ERROR_INVALID_HANDLE)),
            Some(SkipReason::InvalidHandle)
        );
    }

    #[test]
    fn test_unexpected_failure_has_no_reason() {
        assert_eq!(skip_reason(&error(ERROR_FILE_NOT_FOUND)), None);
    }

    #[test]
    fn test_missing_process_is_skipped() {
        // PIDs are multiples of four, so this one never exists.
        let entry = HandleTableEntry {
            process_id: 0xFFFF_FFFF,
            handle_value: 0x4,
            object_type_index: 0,
            granted_access: 0,
            object_address: 0,
            handle_attributes: 0,
        };
        assert!(matches!(
            duplicate_into_current(&entry).unwrap(),
            Duplication::Skipped(SkipReason::ProcessUnavailable)
        ));
    }
}
