/// Remote name querier: object name queries that cannot hang the caller.
///
/// Querying the name of a synchronous pipe or some device handles blocks
/// until the other end acts, possibly forever. Each query therefore runs on
/// a throwaway thread whose entry point is a stub from [`crate::stub`] with
/// every argument baked in. The caller waits with a timeout; a thread that
/// overruns is terminated and abandoned.
///
/// A terminated thread may have been stopped mid-write, so the memory it
/// could still touch is never reused or freed. Both the code region and the
/// output buffer are fenced (leaked) and the next query allocates a fresh
/// output buffer.
use super::handle::OwnedHandle;
use super::ntdll::{
    NtCreateThreadEx, OBJECT_NAME_INFORMATION, THREAD_ALL_ACCESS,
    THREAD_CREATE_FLAGS_SKIP_THREAD_ATTACH,
};
use crate::backend::{NameQuery, Unnamed};
use crate::error::HandleError;
use crate::nt::{decode_object_name, Layout, NtStatus};
use crate::stub::{Arch, StubArgs};
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use windows::core::{s, w, PCSTR, PCWSTR};
use windows::Win32::Foundation::{HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows::Win32::System::Diagnostics::Debug::FlushInstructionCache;
use windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress};
use windows::Win32::System::Memory::{
    VirtualAlloc, VirtualFree, VirtualProtect, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE,
    PAGE_EXECUTE_READ, PAGE_PROTECTION_FLAGS, PAGE_READWRITE,
};
use windows::Win32::System::Threading::{
    GetCurrentProcess, GetExitCodeThread, TerminateThread, WaitForSingleObject,
};

/// Output buffer size: the largest possible `UNICODE_STRING` payload plus
/// its header, so a name query never reports `BUFFER_OVERFLOW`.
pub const NAME_BUFFER_BYTES: usize = 0x1_0000 + 2 * std::mem::size_of::<usize>();

/// Regions leaked after a timed-out query, across all queriers.
static FENCED: AtomicUsize = AtomicUsize::new(0);

/// Number of memory regions fenced so far in this process.
pub fn fenced_regions() -> usize {
    FENCED.load(Ordering::Relaxed)
}

/// A private committed allocation, released on drop unless fenced.
struct Region {
    ptr: *mut c_void,
    len: usize,
}

impl Region {
    fn alloc(len: usize) -> Result<Self, HandleError> {
        // SAFETY: fresh private allocation; no existing memory is touched.
        let ptr = unsafe { VirtualAlloc(None, len, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE) };
        if ptr.is_null() {
            return Err(HandleError::win32(
                "VirtualAlloc",
                windows::core::Error::from_win32(),
            ));
        }
        Ok(Self { ptr, len })
    }

    fn address(&self) -> u64 {
        self.ptr as usize as u64
    }

    fn as_bytes(&self) -> &[u8] {
        // SAFETY: `len` committed bytes starting at `ptr`, alive as long as self.
        unsafe { std::slice::from_raw_parts(self.ptr.cast::<u8>(), self.len) }
    }

    fn as_mut_bytes(&mut self) -> &mut [u8] {
        // SAFETY: as above, and we hold the only reference.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.cast::<u8>(), self.len) }
    }

    /// Switch the region to execute-read and flush the instruction cache.
    fn make_executable(&self) -> Result<(), HandleError> {
        let mut old = PAGE_PROTECTION_FLAGS::default();
        // SAFETY: the region belongs to us and spans `len` bytes.
        unsafe { VirtualProtect(self.ptr, self.len, PAGE_EXECUTE_READ, &mut old) }
            .map_err(|e| HandleError::win32("VirtualProtect", e))?;
        // SAFETY: flushing our own freshly written code.
        unsafe {
            FlushInstructionCache(GetCurrentProcess(), Some(self.ptr.cast_const()), self.len)
        }
        .map_err(|e| HandleError::win32("FlushInstructionCache", e))
    }

    /// Leak the region: a terminated thread may still reference it.
    fn fence(self) {
        FENCED.fetch_add(1, Ordering::Relaxed);
        std::mem::forget(self);
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // SAFETY: allocated by VirtualAlloc and not fenced.
        if let Err(e) = unsafe { VirtualFree(self.ptr, 0, MEM_RELEASE) } {
            warn!("VirtualFree failed: {e}");
        }
    }
}

fn resolve(module: PCWSTR, routine: PCSTR) -> Result<u64, HandleError> {
    // SAFETY: both names are static NUL-terminated strings.
    let module = unsafe { GetModuleHandleW(module) }
        .map_err(|e| HandleError::win32("GetModuleHandleW", e))?;
    // SAFETY: as above.
    let address = unsafe { GetProcAddress(module, routine) }.ok_or_else(|| {
        HandleError::win32("GetProcAddress", windows::core::Error::from_win32())
    })?;
    Ok(address as usize as u64)
}

/// Runs object name queries on disposable threads.
pub struct RemoteNameQuerier {
    arch: Arch,
    query_routine: u64,
    exit_routine: u64,
    /// Output buffer reused across completed queries. Taken and fenced when a
    /// query overruns; the next query allocates a fresh one.
    buffer: Option<Region>,
}

impl RemoteNameQuerier {
    /// Resolve the routines the stub calls and allocate the output buffer.
    pub fn new() -> Result<Self, HandleError> {
        let arch = Arch::current()
            .ok_or(HandleError::UnsupportedArchitecture(std::env::consts::ARCH))?;
        let query_routine = resolve(w!("ntdll.dll"), s!("NtQueryObject"))?;
        let exit_routine = resolve(w!("kernel32.dll"), s!("ExitThread"))?;
        debug!("Name querier ready for {arch}");

        Ok(Self {
            arch,
            query_routine,
            exit_routine,
            buffer: Some(Region::alloc(NAME_BUFFER_BYTES)?),
        })
    }

    /// The current output buffer, allocating one if the last was fenced.
    fn buffer(&mut self) -> Result<&mut Region, HandleError> {
        let buffer = match self.buffer.take() {
            Some(buffer) => buffer,
            None => Region::alloc(NAME_BUFFER_BYTES)?,
        };
        Ok(self.buffer.insert(buffer))
    }

    /// Query the name of `handle`, giving up after `timeout`.
    pub fn query(
        &mut self,
        handle: &OwnedHandle,
        timeout: Duration,
    ) -> Result<NameQuery, HandleError> {
        let buffer = self.buffer()?;
        buffer.as_mut_bytes().fill(0);
        let buffer_address = buffer.address();

        let args = StubArgs {
            handle: handle.raw().0 as usize as u64,
            info_class: OBJECT_NAME_INFORMATION,
            buffer: buffer_address,
            buffer_len: NAME_BUFFER_BYTES as u32,
            query_routine: self.query_routine,
            exit_routine: self.exit_routine,
        };
        let code = self.arch.encode(&args);

        let mut region = Region::alloc(code.len())?;
        region.as_mut_bytes()[..code.len()].copy_from_slice(&code);
        region.make_executable()?;

        // The thread skips DLL attach/detach callouts, so it never holds the
        // loader lock and can be terminated anywhere in the stub. A lock taken
        // inside the query routine itself is still lost on termination.
        let mut raw_thread = HANDLE::default();
        // SAFETY: the region holds a complete stub for this architecture that
        // ignores its parameter and ends by exiting the thread. It stays
        // mapped until the thread has exited or the region is fenced.
        let status = unsafe {
            NtCreateThreadEx(
                &mut raw_thread,
                THREAD_ALL_ACCESS,
                std::ptr::null(),
                GetCurrentProcess(),
                region.ptr,
                std::ptr::null_mut(),
                THREAD_CREATE_FLAGS_SKIP_THREAD_ATTACH,
                0,
                0,
                0,
                std::ptr::null_mut(),
            )
        };
        if status != NtStatus::SUCCESS {
            return Err(HandleError::win32("NtCreateThreadEx", status));
        }
        // SAFETY: NtCreateThreadEx returned a handle we own.
        let thread = unsafe { OwnedHandle::from_raw(raw_thread) };

        let millis = u32::try_from(timeout.as_millis())
            .unwrap_or(u32::MAX - 1)
            .min(u32::MAX - 1);
        // SAFETY: waiting on our own thread handle.
        let waited = unsafe { WaitForSingleObject(thread.raw(), millis) };

        if waited == WAIT_OBJECT_0 {
            let mut exit_code = 0u32;
            // SAFETY: the thread has exited; `exit_code` is a valid out pointer.
            unsafe { GetExitCodeThread(thread.raw(), &mut exit_code) }
                .map_err(|e| HandleError::win32("GetExitCodeThread", e))?;
            drop(region);

            let status = NtStatus::from_exit_code(exit_code);
            let buffer = self.buffer()?;
            let base = buffer.address();
            NameQuery::from_status(status, || {
                decode_object_name(buffer.as_bytes(), base, Layout::native())
            })
        } else if waited == WAIT_TIMEOUT {
            self.abandon(thread.raw(), region);
            Ok(NameQuery::Unnamed(Unnamed::TimedOut))
        } else {
            // The thread state is unknown; treat it like an overrun.
            let err = windows::core::Error::from_win32();
            self.abandon(thread.raw(), region);
            Err(HandleError::win32("WaitForSingleObject", err))
        }
    }

    /// Terminate an overrunning query thread and fence everything it could
    /// still touch. Nothing here can fail, so the tainted buffer is always
    /// gone before the next query.
    fn abandon(&mut self, thread: HANDLE, code: Region) {
        // SAFETY: terminating our own stub thread.
        if let Err(e) = unsafe { TerminateThread(thread, NtStatus::TIMEOUT.as_exit_code()) } {
            warn!("TerminateThread failed: {e}");
        }
        code.fence();
        if let Some(buffer) = self.buffer.take() {
            buffer.fence();
        }
        debug!("Name query timed out; {} regions fenced", fenced_regions());
    }
}
