/// Object type registry: kernel object type index → type name.
///
/// Built from a single `ObjectTypesInformation` query. Type indices are
/// stable for a boot session, so the native backend builds the registry once
/// per process and never rebuilds it.
///
/// # Buffer layout
///
/// ```text
///   0                 NumberOfTypes (ULONG), padded to a pointer
///   align_up(4)       OBJECT_TYPE_INFORMATION record
///                     name buffer (MaximumLength bytes, padded to a pointer)
///                     OBJECT_TYPE_INFORMATION record
///                     ...
/// ```
///
/// Each record starts with its `TypeName` `UNICODE_STRING` and carries the
/// type index byte `74` bytes after it. The next record begins after the
/// *aligned* `MaximumLength` of the name buffer; advancing by `Length` alone
/// desynchronises the walk on the first name whose length is not a multiple
/// of the pointer width.
use crate::error::HandleError;
use crate::nt::layout::{read_u16_le_opt, read_u32_le_opt, read_u8_opt, Layout};
use compact_str::CompactString;
use std::collections::HashMap;

const WHAT: &str = "object type table";

/// One kernel object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTypeDescriptor {
    pub type_index: u16,
    pub type_name: CompactString,
}

/// Size of one `OBJECT_TYPE_INFORMATION` record, excluding its name buffer.
pub fn record_size(layout: Layout) -> usize {
    layout.unicode_string_size() + 88
}

/// Offset of the `TypeIndex` byte within a record.
pub fn type_index_offset(layout: Layout) -> usize {
    layout.unicode_string_size() + 74
}

/// Decode every descriptor in an `ObjectTypesInformation` buffer.
///
/// `base` is the address the kernel saw for `bytes[0]`; name buffer pointers
/// are resolved relative to it. The number of descriptors returned always
/// equals the declared count.
pub fn parse_object_types(
    bytes: &[u8],
    base: u64,
    layout: Layout,
) -> Result<Vec<ObjectTypeDescriptor>, HandleError> {
    let count = read_u32_le_opt(bytes, 0).ok_or_else(|| HandleError::malformed(WHAT, 0))?;
    let record = record_size(layout);
    let mut offset = layout.align_up(4);
    let mut descriptors = Vec::with_capacity(count as usize);

    for _ in 0..count {
        if offset + record > bytes.len() {
            return Err(HandleError::malformed(WHAT, offset));
        }

        let max_length = read_u16_le_opt(bytes, offset + 2)
            .ok_or_else(|| HandleError::malformed(WHAT, offset))? as usize;
        let type_index = read_u8_opt(bytes, offset + type_index_offset(layout))
            .ok_or_else(|| HandleError::malformed(WHAT, offset))?;
        let name = layout
            .read_unicode_string(bytes, offset, base, WHAT)?
            .ok_or_else(|| HandleError::malformed(WHAT, offset))?;

        descriptors.push(ObjectTypeDescriptor {
            type_index: u16::from(type_index),
            type_name: CompactString::from(name),
        });

        offset += record + layout.align_up(max_length);
    }

    Ok(descriptors)
}

/// Immutable index → name lookup.
#[derive(Debug, Clone, Default)]
pub struct ObjectTypeRegistry {
    by_index: HashMap<u16, CompactString>,
}

impl ObjectTypeRegistry {
    /// Build a registry from decoded descriptors. A later duplicate index
    /// replaces an earlier one.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ObjectTypeDescriptor>) -> Self {
        let by_index = descriptors
            .into_iter()
            .map(|d| (d.type_index, d.type_name))
            .collect();
        Self { by_index }
    }

    /// Name of the object type with the given index.
    pub fn resolve(&self, type_index: u16) -> Option<&str> {
        self.by_index.get(&type_index).map(CompactString::as_str)
    }

    /// Index of the type with the given name, if registered.
    pub fn index_of(&self, type_name: &str) -> Option<u16> {
        self.by_index
            .iter()
            .find(|(_, name)| name.as_str() == type_name)
            .map(|(&index, _)| index)
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }
}
