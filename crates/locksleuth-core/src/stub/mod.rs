/// Name-query stubs: per-architecture machine code that calls the object
/// name query routine on a baked-in handle and exits the thread with the
/// returned status.
///
/// The stub runs as the entry point of a disposable thread, so all call
/// arguments are encoded as immediates and no thread parameter is needed:
///
/// 1. Load `(handle, info_class, buffer, buffer_len, NULL)` per the platform
///    calling convention.
/// 2. Call the query routine.
/// 3. Call the thread-exit routine with the returned status as exit code.
///
/// Only byte emission lives here. Allocating, protecting and running the
/// code is the job of `platform::remote`.
pub mod amd64;
pub mod arm64;
pub mod x86;

use std::fmt;

/// Everything a stub bakes in.
///
/// Addresses are `u64` so every encoder can be exercised on any host; the
/// 32-bit encoder truncates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StubArgs {
    /// Local handle whose name is queried.
    pub handle: u64,
    /// `OBJECT_INFORMATION_CLASS` to pass.
    pub info_class: u32,
    /// Output buffer address.
    pub buffer: u64,
    /// Output buffer length in bytes.
    pub buffer_len: u32,
    /// Address of the query routine.
    pub query_routine: u64,
    /// Address of the thread-exit routine.
    pub exit_routine: u64,
}

/// CPU architectures with a stub encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86,
    Amd64,
    Arm64,
}

impl Arch {
    /// Architecture of the running process, if it has a stub encoding.
    ///
    /// The stub runs inside this process, so the compile target decides.
    pub const fn current() -> Option<Self> {
        if cfg!(target_arch = "x86_64") {
            Some(Self::Amd64)
        } else if cfg!(target_arch = "x86") {
            Some(Self::X86)
        } else if cfg!(target_arch = "aarch64") {
            Some(Self::Arm64)
        } else {
            None
        }
    }

    /// Emit the stub for these arguments.
    pub fn encode(self, args: &StubArgs) -> Vec<u8> {
        match self {
            Self::X86 => x86::encode(args),
            Self::Amd64 => amd64::encode(args),
            Self::Arm64 => arm64::encode(args),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::Amd64 => "x86_64",
            Self::Arm64 => "aarch64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const ARGS: StubArgs = StubArgs {
        handle: 0x0000_0000_0000_01A4,
        info_class: 1,
        buffer: 0x0000_01F0_0000_0000,
        buffer_len: 0x1_0010,
        query_routine: 0x0000_7FFB_1234_5678,
        exit_routine: 0x0000_7FFB_8765_4320,
    };

    #[test]
    fn test_current_matches_target() {
        let expected = if cfg!(target_arch = "x86_64") {
            Some(Arch::Amd64)
        } else if cfg!(target_arch = "x86") {
            Some(Arch::X86)
        } else if cfg!(target_arch = "aarch64") {
            Some(Arch::Arm64)
        } else {
            None
        };
        assert_eq!(Arch::current(), expected);
    }

    #[test]
    fn test_dispatch_selects_encoder() {
        assert_eq!(Arch::Amd64.encode(&ARGS), amd64::encode(&ARGS));
        assert_eq!(Arch::X86.encode(&ARGS), x86::encode(&ARGS));
        assert_eq!(Arch::Arm64.encode(&ARGS), arm64::encode(&ARGS));
    }

    #[test]
    fn test_encodings_differ() {
        let a = Arch::Amd64.encode(&ARGS);
        let b = Arch::X86.encode(&ARGS);
        let c = Arch::Arm64.encode(&ARGS);
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }
}
