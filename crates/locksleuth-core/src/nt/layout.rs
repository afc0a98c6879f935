/// Structure layout of kernel-filled buffers.
///
/// The native query routines write pointer-sized fields whose width depends
/// on the process architecture. Every decoder takes a [`Layout`] instead of
/// casting the buffer to a `#[repr(C)]` struct, which keeps the reads
/// bounds-checked and lets both widths be exercised on any host.
use crate::error::HandleError;

/// Pointer width of the structures being decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub pointer_width: usize,
}

impl Layout {
    /// 64-bit layout (x64, ARM64).
    pub const WIDE: Self = Self { pointer_width: 8 };
    /// 32-bit layout (x86).
    pub const NARROW: Self = Self { pointer_width: 4 };

    /// Layout of the running process.
    pub const fn native() -> Self {
        Self {
            pointer_width: std::mem::size_of::<usize>(),
        }
    }

    /// Round `n` up to the next multiple of the pointer width.
    #[inline]
    pub fn align_up(self, n: usize) -> usize {
        let w = self.pointer_width;
        (n + w - 1) & !(w - 1)
    }

    /// Size of a `UNICODE_STRING` (two `u16` lengths padded to a pointer,
    /// followed by the buffer pointer).
    #[inline]
    pub fn unicode_string_size(self) -> usize {
        2 * self.pointer_width
    }

    /// Read a pointer-sized little-endian field.
    pub fn read_pointer(self, bytes: &[u8], off: usize) -> Option<u64> {
        match self.pointer_width {
            8 => read_u64_le_opt(bytes, off),
            _ => read_u32_le_opt(bytes, off).map(u64::from),
        }
    }

    /// Read a `UNICODE_STRING` at `off` whose buffer pointer is expressed
    /// relative to `base`, the address the kernel saw for `bytes[0]`.
    ///
    /// Returns `Ok(None)` for an empty string.
    pub fn read_unicode_string(
        self,
        bytes: &[u8],
        off: usize,
        base: u64,
        what: &'static str,
    ) -> Result<Option<String>, HandleError> {
        let length = read_u16_le_opt(bytes, off)
            .ok_or_else(|| HandleError::malformed(what, off))? as usize;
        if length == 0 {
            return Ok(None);
        }
        let pointer = self
            .read_pointer(bytes, off + self.pointer_width)
            .ok_or_else(|| HandleError::malformed(what, off))?;

        let start = pointer
            .checked_sub(base)
            .and_then(|s| usize::try_from(s).ok())
            .ok_or_else(|| HandleError::malformed(what, off))?;
        let chars = start
            .checked_add(length)
            .and_then(|end| bytes.get(start..end))
            .ok_or_else(|| HandleError::malformed(what, start))?;

        let text: String = char::decode_utf16(
            chars
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]])),
        )
        .map(|r| r.unwrap_or('\u{FFFD}'))
        .collect();

        let trimmed = text.trim_end_matches('\0');
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_owned()))
        }
    }
}

pub(crate) fn read_u8_opt(bytes: &[u8], off: usize) -> Option<u8> {
    bytes.get(off).copied()
}

pub(crate) fn read_u16_le_opt(bytes: &[u8], off: usize) -> Option<u16> {
    let b = bytes.get(off..off.checked_add(2)?)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

pub(crate) fn read_u32_le_opt(bytes: &[u8], off: usize) -> Option<u32> {
    let b = bytes.get(off..off.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn read_u64_le_opt(bytes: &[u8], off: usize) -> Option<u64> {
    let b = bytes.get(off..off.checked_add(8)?)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(b);
    Some(u64::from_le_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect()
    }

    #[test]
    fn test_align_up() {
        assert_eq!(Layout::WIDE.align_up(0), 0);
        assert_eq!(Layout::WIDE.align_up(4), 8);
        assert_eq!(Layout::WIDE.align_up(10), 16);
        assert_eq!(Layout::NARROW.align_up(10), 12);
        assert_eq!(Layout::NARROW.align_up(12), 12);
    }

    #[test]
    fn test_native_matches_target() {
        assert_eq!(
            Layout::native().pointer_width,
            std::mem::size_of::<*const u8>()
        );
    }

    #[test]
    fn test_read_unicode_string_trims_nulls() {
        let base = 0x1000u64;
        let mut buf = vec![0u8; 16];
        let name = utf16("File\0\0");
        buf[0..2].copy_from_slice(&(name.len() as u16).to_le_bytes());
        buf[2..4].copy_from_slice(&(name.len() as u16).to_le_bytes());
        buf[8..16].copy_from_slice(&(base + 16).to_le_bytes());
        buf.extend_from_slice(&name);

        let s = Layout::WIDE
            .read_unicode_string(&buf, 0, base, "test")
            .unwrap();
        assert_eq!(s.as_deref(), Some("File"));
    }

    #[test]
    fn test_read_unicode_string_empty_is_none() {
        let buf = vec![0u8; 16];
        let s = Layout::WIDE.read_unicode_string(&buf, 0, 0, "test").unwrap();
        assert!(s.is_none());
    }

    #[test]
    fn test_read_unicode_string_pointer_outside_buffer() {
        let mut buf = vec![0u8; 8];
        buf[0..2].copy_from_slice(&8u16.to_le_bytes());
        buf[4..8].copy_from_slice(&0x9000u32.to_le_bytes());
        let err = Layout::NARROW
            .read_unicode_string(&buf, 0, 0x1000, "test")
            .unwrap_err();
        assert!(matches!(err, HandleError::Malformed { what: "test", .. }));
    }

    #[test]
    fn test_short_reads_are_none() {
        let bytes = [1u8, 2, 3];
        assert_eq!(read_u16_le_opt(&bytes, 1), Some(0x0302));
        assert_eq!(read_u16_le_opt(&bytes, 2), None);
        assert_eq!(read_u32_le_opt(&bytes, 0), None);
        assert_eq!(read_u64_le_opt(&bytes, usize::MAX), None);
    }
}
