/// Records describing one open handle in some process.
use serde::{Deserialize, Serialize};

/// One row of the system handle table snapshot.
///
/// Created once per enumeration pass and discarded after the pass; the values
/// are only meaningful while the owning process keeps the handle open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleTableEntry {
    /// Process that owns the handle.
    pub process_id: u32,
    /// Handle value inside the owning process.
    pub handle_value: usize,
    /// Kernel object type index, resolved through the object type registry.
    pub object_type_index: u16,
    /// Access mask the owning process was granted.
    pub granted_access: u32,
    /// Kernel address of the object (zero when the caller lacks the privilege
    /// to see kernel addresses).
    pub object_address: usize,
    /// `OBJ_*` handle attribute flags.
    pub handle_attributes: u32,
}

impl HandleTableEntry {
    /// Identity of this handle for [`crate::catalog::FileHandleCatalog::close_handles`].
    pub fn handle_ref(&self) -> HandleRef {
        HandleRef {
            process_id: self.process_id,
            handle_value: self.handle_value,
        }
    }
}

/// A `(process, handle)` pair identifying a handle in another process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleRef {
    pub process_id: u32,
    pub handle_value: usize,
}

impl From<&HandleTableEntry> for HandleRef {
    fn from(entry: &HandleTableEntry) -> Self {
        entry.handle_ref()
    }
}
