/// Drive-letter enumeration and device name lookup.
///
/// Builds the [`NtPathTable`] the catalog uses to turn
/// `\Device\HarddiskVolume3\...` into `C:\...`.
use crate::error::HandleError;
use crate::ntpath::NtPathTable;
use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;
use windows::core::PCWSTR;
use windows::Win32::Storage::FileSystem::{GetLogicalDriveStringsW, QueryDosDeviceW};

/// Drive roots currently mounted, e.g. `["C:\\", "D:\\"]`.
pub fn logical_drives() -> Result<Vec<String>, HandleError> {
    // GetLogicalDriveStringsW returns null-separated drive root strings.
    let mut buffer = [0u16; 512];
    let len = unsafe { GetLogicalDriveStringsW(Some(&mut buffer)) } as usize;

    if len == 0 || len > buffer.len() {
        return Err(HandleError::win32(
            "GetLogicalDriveStringsW",
            windows::core::Error::from_win32(),
        ));
    }

    let full = OsString::from_wide(&buffer[..len]);
    Ok(full
        .to_string_lossy()
        .split('\0')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect())
}

/// NT device name behind a drive letter such as `C:`.
pub fn device_for_drive(letter: &str) -> Option<String> {
    let letter_wide: Vec<u16> = letter.encode_utf16().chain(std::iter::once(0)).collect();
    let mut target = [0u16; 1024];
    let len = unsafe { QueryDosDeviceW(PCWSTR(letter_wide.as_ptr()), Some(&mut target)) } as usize;
    if len == 0 {
        tracing::debug!("QueryDosDeviceW({letter}) failed");
        return None;
    }

    // The result is a null-separated list; the first entry is the live one.
    let first = &target[..len.min(target.len())];
    let end = first.iter().position(|&c| c == 0).unwrap_or(first.len());
    Some(String::from_utf16_lossy(&first[..end]))
}

/// Current device-prefix → drive-letter table.
///
/// Drives whose device cannot be resolved are left out; their paths are
/// simply never reported.
pub fn device_map() -> Result<NtPathTable, HandleError> {
    let mut table = NtPathTable::new();
    for root in logical_drives()? {
        let letter = root.trim_end_matches('\\');
        if let Some(device) = device_for_drive(letter) {
            tracing::debug!("{letter} -> {device}");
            table.insert(&device, letter);
        }
    }
    Ok(table)
}
