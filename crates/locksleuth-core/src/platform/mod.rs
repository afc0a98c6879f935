/// Windows implementation of the handle backend.
///
/// Everything that calls into the OS lives here; the decoding and filtering
/// it feeds are portable and live in [`crate::nt`] and [`crate::catalog`].
pub mod backend;
pub mod drives;
pub mod duplicate;
pub mod handle;
mod ntdll;
pub mod permissions;
pub mod remote;
pub mod snapshot;

pub use backend::NativeBackend;
pub use drives::device_map;
pub use handle::OwnedHandle;
pub use permissions::{enable_debug_privilege, is_elevated};
pub use remote::{fenced_regions, RemoteNameQuerier, NAME_BUFFER_BYTES};
pub use snapshot::{enumerate_handles, object_type_registry};
