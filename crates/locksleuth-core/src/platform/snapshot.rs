/// System handle snapshot and object type table capture.
///
/// Both queries size their own output: the caller offers a buffer, the
/// kernel reports `INFO_LENGTH_MISMATCH` with the size it needs, and the
/// buffer grows until the data fits. The handle table changes between
/// attempts, so each retry adds headroom on top of the reported size.
use super::handle::AlignedBuffer;
use super::ntdll::{
    NtQueryObject, NtQuerySystemInformation, OBJECT_TYPES_INFORMATION,
    SYSTEM_EXTENDED_HANDLE_INFORMATION,
};
use crate::error::HandleError;
use crate::model::HandleTableEntry;
use crate::nt::{parse_handle_table, parse_object_types, Layout, NtStatus, ObjectTypeRegistry};
use std::ffi::c_void;
use std::sync::OnceLock;
use tracing::{debug, info};
use windows::Win32::Foundation::HANDLE;

/// First guess for the handle table size.
pub const INITIAL_SNAPSHOT_BYTES: usize = 1 << 20;

/// First guess for the object type table size.
const INITIAL_TYPES_BYTES: usize = 64 * 1024;

/// Growth stops here; a larger table means something is wrong.
const MAX_QUERY_BYTES: usize = 1 << 30;

/// Extra room added on each retry for handles opened in the meantime.
const RETRY_HEADROOM: usize = 64 * 1024;

/// Process-wide object type registry, captured on first use.
static REGISTRY: OnceLock<ObjectTypeRegistry> = OnceLock::new();

/// Call `query` with a growing buffer until it stops asking for more room.
fn query_growing(
    initial: usize,
    mut query: impl FnMut(*mut c_void, u32, &mut u32) -> NtStatus,
) -> Result<AlignedBuffer, NtStatus> {
    let mut size = initial;
    loop {
        let mut buffer = AlignedBuffer::new(size);
        let mut needed = 0u32;
        let len = u32::try_from(buffer.len()).unwrap_or(u32::MAX);
        let status = query(buffer.as_mut_ptr(), len, &mut needed);

        match status {
            NtStatus::SUCCESS => return Ok(buffer),
            NtStatus::INFO_LENGTH_MISMATCH | NtStatus::BUFFER_OVERFLOW => {
                let next = (needed as usize + RETRY_HEADROOM).max(size * 2);
                if next > MAX_QUERY_BYTES {
                    return Err(status);
                }
                debug!("Query buffer of {size} bytes too small, retrying with {next}");
                size = next;
            }
            other => return Err(other),
        }
    }
}

/// Capture every handle open in the system, in table order.
pub fn enumerate_handles() -> Result<Vec<HandleTableEntry>, HandleError> {
    let buffer = query_growing(INITIAL_SNAPSHOT_BYTES, |ptr, len, needed| {
        // SAFETY: `ptr` points at `len` writable bytes owned by the caller.
        unsafe { NtQuerySystemInformation(SYSTEM_EXTENDED_HANDLE_INFORMATION, ptr, len, needed) }
    })
    .map_err(|status| HandleError::Snapshot { status })?;

    let entries = parse_handle_table(buffer.as_bytes(), Layout::native())?;
    debug!("Captured {} handle table entries", entries.len());
    Ok(entries)
}

/// Capture the object type table.
pub fn query_object_types() -> Result<ObjectTypeRegistry, HandleError> {
    let buffer = query_growing(INITIAL_TYPES_BYTES, |ptr, len, needed| {
        // SAFETY: a null handle selects the system-wide type table; `ptr`
        // points at `len` writable bytes.
        unsafe { NtQueryObject(HANDLE::default(), OBJECT_TYPES_INFORMATION, ptr, len, needed) }
    })
    .map_err(|status| HandleError::ObjectTypes { status })?;

    let descriptors = parse_object_types(buffer.as_bytes(), buffer.base(), Layout::native())?;
    Ok(ObjectTypeRegistry::from_descriptors(descriptors))
}

/// The object type registry, built once per process.
///
/// Type indices are fixed for a boot session. A failed capture is not
/// cached, so the next call retries.
pub fn object_type_registry() -> Result<&'static ObjectTypeRegistry, HandleError> {
    if let Some(registry) = REGISTRY.get() {
        return Ok(registry);
    }
    let registry = query_object_types()?;
    info!("Object type registry captured: {} types", registry.len());
    Ok(REGISTRY.get_or_init(|| registry))
}
