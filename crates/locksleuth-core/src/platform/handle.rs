/// RAII wrapper for kernel handles and an aligned query buffer.
use std::ffi::c_void;
use windows::Win32::Foundation::{CloseHandle, HANDLE};

/// A handle owned by this process, closed on drop.
#[derive(Debug)]
pub struct OwnedHandle(HANDLE);

impl OwnedHandle {
    /// Take ownership of `handle`.
    ///
    /// # Safety
    ///
    /// `handle` must be open, owned by the caller, and not closed elsewhere.
    pub unsafe fn from_raw(handle: HANDLE) -> Self {
        Self(handle)
    }

    pub fn raw(&self) -> HANDLE {
        self.0
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            // SAFETY: we own the handle and nobody else closes it.
            let _ = unsafe { CloseHandle(self.0) };
        }
    }
}

/// Heap buffer with pointer alignment for kernel-filled structures.
pub(crate) struct AlignedBuffer {
    words: Vec<u64>,
}

impl AlignedBuffer {
    pub fn new(bytes: usize) -> Self {
        Self {
            words: vec![0u64; bytes.div_ceil(8)],
        }
    }

    pub fn len(&self) -> usize {
        self.words.len() * 8
    }

    pub fn as_mut_ptr(&mut self) -> *mut c_void {
        self.words.as_mut_ptr().cast()
    }

    /// Address the kernel sees for byte 0.
    pub fn base(&self) -> u64 {
        self.words.as_ptr() as usize as u64
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: u64 storage reinterpreted as bytes, same length and lifetime.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len()) }
    }
}
