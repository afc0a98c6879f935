/// LockSleuth Core: open-handle discovery engine.
///
/// Answers "which processes hold this file open?" by walking the system-wide
/// handle table, keeping file and directory handles, and resolving each one
/// to a drive-letter path. Name queries that can block forever on some
/// handle types run on a disposable thread with a hard timeout, so a pass
/// always finishes.
///
/// # Modules
///
/// - [`model`]: Snapshot records and the caller-facing output types.
/// - [`nt`]: Bounds-checked decoders for kernel-filled buffers.
/// - [`ntpath`]: NT device path → drive-letter translation.
/// - [`stub`]: Per-architecture name-query thread stubs.
/// - [`backend`]: OS capability interface and the scripted test backend.
/// - [`catalog`]: The discovery pass and the remote handle closer.
/// - [`platform`]: Windows implementation of the backend (Windows only).
pub mod backend;
pub mod catalog;
pub mod error;
pub mod model;
pub mod nt;
pub mod ntpath;
#[cfg(windows)]
pub mod platform;
pub mod stub;

pub use catalog::{CatalogOptions, FileHandleCatalog, PathFilter, NAME_QUERY_TIMEOUT};
pub use error::HandleError;
pub use model::{FileHandleInfo, FileObjectKind, HandleRef, HandleTableEntry};

/// Every open file or directory handle on the system whose drive-letter path
/// starts with `path_filter`, or all of them when no filter is given.
///
/// Builds a fresh backend per call so the drive-letter table reflects the
/// current mounts. The object type registry is captured once per process.
#[cfg(windows)]
pub fn get_open_handles(path_filter: Option<&str>) -> Result<Vec<FileHandleInfo>, HandleError> {
    let backend = platform::NativeBackend::new()?;
    FileHandleCatalog::new(backend).get_open_handles(path_filter)
}

/// Close each handle inside its owning process. Best-effort: failures are
/// logged and the remaining handles are still processed.
#[cfg(windows)]
pub fn close_handles(entries: &[HandleRef]) -> Result<(), HandleError> {
    let backend = platform::NativeBackend::new()?;
    FileHandleCatalog::new(backend).close_handles(entries);
    Ok(())
}
