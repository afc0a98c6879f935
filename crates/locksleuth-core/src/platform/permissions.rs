/// Elevation and privilege checks for Windows.
///
/// Duplicating handles out of other users' processes needs administrator
/// rights, and protected services additionally need `SeDebugPrivilege`.
use super::handle::OwnedHandle;
use crate::error::HandleError;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{GetLastError, ERROR_NOT_ALL_ASSIGNED, HANDLE, LUID};
use windows::Win32::Security::{
    AdjustTokenPrivileges, GetTokenInformation, LookupPrivilegeValueW, TokenElevation,
    LUID_AND_ATTRIBUTES, SE_DEBUG_NAME, SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES,
    TOKEN_ACCESS_MASK, TOKEN_ELEVATION, TOKEN_PRIVILEGES, TOKEN_QUERY,
};
use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

fn current_token(access: TOKEN_ACCESS_MASK) -> windows::core::Result<OwnedHandle> {
    let mut token = HANDLE::default();
    unsafe { OpenProcessToken(GetCurrentProcess(), access, &mut token)? };
    Ok(unsafe { OwnedHandle::from_raw(token) })
}

/// Check whether the current process is running with elevated (admin) privileges.
pub fn is_elevated() -> bool {
    let Ok(token) = current_token(TOKEN_QUERY) else {
        return false;
    };

    let mut elevation = TOKEN_ELEVATION::default();
    let mut return_length = 0u32;
    let result = unsafe {
        GetTokenInformation(
            token.raw(),
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            std::mem::size_of::<TOKEN_ELEVATION>() as u32,
            &mut return_length,
        )
    };

    result.is_ok() && elevation.TokenIsElevated != 0
}

/// Enable `SeDebugPrivilege` on the current process token.
///
/// Returns `Ok(false)` when the token does not hold the privilege (the
/// process is not elevated), `Ok(true)` once it is enabled.
pub fn enable_debug_privilege() -> Result<bool, HandleError> {
    let token = current_token(TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY)
        .map_err(|e| HandleError::win32("OpenProcessToken", e))?;

    let mut luid = LUID::default();
    unsafe { LookupPrivilegeValueW(PCWSTR::null(), SE_DEBUG_NAME, &mut luid) }
        .map_err(|e| HandleError::win32("LookupPrivilegeValueW", e))?;

    let privileges = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: luid,
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };
    unsafe {
        AdjustTokenPrivileges(
            token.raw(),
            false,
            Some(&privileges as *const _),
            0,
            None,
            None,
        )
    }
        .map_err(|e| HandleError::win32("AdjustTokenPrivileges", e))?;

    // AdjustTokenPrivileges succeeds even when nothing was assigned.
    Ok(unsafe { GetLastError() } != ERROR_NOT_ALL_ASSIGNED)
}
