/// Data model for handle discovery.
///
/// Re-exports the snapshot records and the caller-facing output types.
pub mod handle;
pub mod info;

pub use handle::{HandleRef, HandleTableEntry};
pub use info::{FileHandleInfo, FileObjectKind};
