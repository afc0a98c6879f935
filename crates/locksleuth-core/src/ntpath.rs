/// NT device path → drive-letter path translation.
///
/// The table maps a volume device name (`\Device\HarddiskVolume3`) to the
/// drive letter it is mounted as (`C:`). It is built from the live drive list
/// on Windows (see `platform::drives`) and consulted read-only.
///
/// Lookups use only the first two segments of an NT path as the key, so
/// `\Device\HarddiskVolume1` never matches a path on `\Device\HarddiskVolume10`.
use std::collections::HashMap;

/// Device-prefix → drive-letter lookup table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NtPathTable {
    /// Keyed by the lower-cased device prefix.
    devices: HashMap<String, String>,
}

impl NtPathTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `device` (e.g. `\Device\HarddiskVolume1`) as mounted at
    /// `drive` (e.g. `C:`). Trailing separators on either side are ignored.
    pub fn insert(&mut self, device: &str, drive: &str) {
        let device = device.trim_end_matches('\\');
        let drive = drive.trim_end_matches('\\');
        if device.is_empty() || drive.is_empty() {
            return;
        }
        self.devices
            .insert(device.to_ascii_lowercase(), drive.to_owned());
    }

    /// Drive letter for an exact device prefix.
    pub fn drive_for(&self, device: &str) -> Option<&str> {
        self.devices
            .get(&device.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Translate an NT path to its drive-letter form.
    ///
    /// Returns `None` when the device prefix is not mounted under any drive
    /// letter; such paths are never reported.
    pub fn to_dos_path(&self, nt_path: &str) -> Option<String> {
        let key = lookup_key(nt_path)?;
        let drive = self.drive_for(key)?;
        let rest = &nt_path[key.len()..];
        Some(format!("{drive}{rest}"))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl<D: AsRef<str>, L: AsRef<str>> FromIterator<(D, L)> for NtPathTable {
    fn from_iter<I: IntoIterator<Item = (D, L)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (device, drive) in iter {
            table.insert(device.as_ref(), drive.as_ref());
        }
        table
    }
}

/// The first two segments of an NT path, as a prefix slice of `nt_path`.
///
/// `\Device\HarddiskVolume1\Users\x` → `\Device\HarddiskVolume1`.
/// Returns `None` unless the path is rooted and has at least two segments.
pub fn lookup_key(nt_path: &str) -> Option<&str> {
    let rest = nt_path.strip_prefix('\\')?;
    let first = rest.find('\\')?;
    if first == 0 {
        return None;
    }
    let after_first = &rest[first + 1..];
    let second_len = after_first.find('\\').unwrap_or(after_first.len());
    if second_len == 0 {
        return None;
    }
    Some(&nt_path[..1 + first + 1 + second_len])
}
