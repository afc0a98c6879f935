/// `NTSTATUS` values returned by the native query routines.
use std::fmt;

/// A raw `NTSTATUS` code.
///
/// `repr(transparent)` so it can be used directly as the return type of
/// `ntdll` declarations.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NtStatus(pub i32);

impl NtStatus {
    pub const SUCCESS: Self = Self(0);
    pub const TIMEOUT: Self = Self(0x0000_0102);
    /// Also the value `GetExitCodeThread` reports as `STILL_ACTIVE`.
    pub const PENDING: Self = Self(0x0000_0103);
    pub const BUFFER_OVERFLOW: Self = Self(0x8000_0005_u32 as i32);
    pub const INFO_LENGTH_MISMATCH: Self = Self(0xC000_0004_u32 as i32);
    pub const INVALID_HANDLE: Self = Self(0xC000_0008_u32 as i32);
    pub const ACCESS_DENIED: Self = Self(0xC000_0022_u32 as i32);
    pub const OBJECT_PATH_INVALID: Self = Self(0xC000_0039_u32 as i32);
    pub const OBJECT_PATH_SYNTAX_BAD: Self = Self(0xC000_003B_u32 as i32);
    pub const NOT_SUPPORTED: Self = Self(0xC000_00BB_u32 as i32);

    /// Build a status from a thread exit code.
    #[inline]
    pub fn from_exit_code(code: u32) -> Self {
        Self(code as i32)
    }

    /// The code reinterpreted as an unsigned thread exit code.
    #[inline]
    pub fn as_exit_code(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0 as u32)
    }
}

impl fmt::Debug for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NtStatus({self})")
    }
}
