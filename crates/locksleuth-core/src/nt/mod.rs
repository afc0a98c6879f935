/// Decoders for the buffers filled by the native query routines.
///
/// Nothing in here touches the OS: each decoder takes a byte slice plus a
/// [`Layout`] so the same code runs against live buffers on Windows and
/// hand-built buffers in tests on any host.
pub mod handles;
pub mod layout;
pub mod name;
pub mod status;
pub mod types;

pub use handles::parse_handle_table;
pub use layout::Layout;
pub use name::{classify_name_status, decode_object_name, NameStatus};
pub use status::NtStatus;
pub use types::{parse_object_types, ObjectTypeDescriptor, ObjectTypeRegistry};
