/// Decoder for the `SystemExtendedHandleInformation` snapshot.
///
/// Buffer layout (`SYSTEM_HANDLE_INFORMATION_EX`):
///
/// ```text
///   0        NumberOfHandles   (ULONG_PTR)
///   pw       Reserved          (ULONG_PTR)
///   2*pw     Handles[]         (SYSTEM_HANDLE_TABLE_ENTRY_INFO_EX)
/// ```
///
/// Entry layout, `pw` = pointer width:
///
/// ```text
///   0        Object                  (PVOID)
///   pw       UniqueProcessId         (ULONG_PTR)
///   2*pw     HandleValue             (ULONG_PTR)
///   3*pw     GrantedAccess           (ULONG)
///   3*pw+4   CreatorBackTraceIndex   (USHORT)
///   3*pw+6   ObjectTypeIndex         (USHORT)
///   3*pw+8   HandleAttributes        (ULONG)
///   3*pw+12  Reserved                (ULONG)
/// ```
use crate::error::HandleError;
use crate::model::HandleTableEntry;
use crate::nt::layout::{read_u16_le_opt, read_u32_le_opt, Layout};

const WHAT: &str = "system handle table";

/// Size in bytes of the snapshot header.
pub fn header_size(layout: Layout) -> usize {
    2 * layout.pointer_width
}

/// Size in bytes of one snapshot entry.
pub fn entry_size(layout: Layout) -> usize {
    3 * layout.pointer_width + 16
}

/// Decode every entry of a snapshot buffer, in table order.
///
/// The declared count must fit inside the buffer; a table that claims more
/// entries than were returned is rejected as a whole rather than read
/// partially.
pub fn parse_handle_table(
    bytes: &[u8],
    layout: Layout,
) -> Result<Vec<HandleTableEntry>, HandleError> {
    let pw = layout.pointer_width;
    let declared = layout
        .read_pointer(bytes, 0)
        .ok_or_else(|| HandleError::malformed(WHAT, 0))?;
    let count = usize::try_from(declared).map_err(|_| HandleError::malformed(WHAT, 0))?;

    let header = header_size(layout);
    let stride = entry_size(layout);
    let needed = count
        .checked_mul(stride)
        .and_then(|n| n.checked_add(header))
        .ok_or_else(|| HandleError::malformed(WHAT, 0))?;
    if needed > bytes.len() {
        return Err(HandleError::malformed(WHAT, bytes.len()));
    }

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let base = header + i * stride;
        let field = |off: usize| HandleError::malformed(WHAT, base + off);

        let object = layout.read_pointer(bytes, base).ok_or_else(|| field(0))?;
        let pid = layout.read_pointer(bytes, base + pw).ok_or_else(|| field(pw))?;
        let value = layout
            .read_pointer(bytes, base + 2 * pw)
            .ok_or_else(|| field(2 * pw))?;
        let granted = read_u32_le_opt(bytes, base + 3 * pw).ok_or_else(|| field(3 * pw))?;
        let type_index =
            read_u16_le_opt(bytes, base + 3 * pw + 6).ok_or_else(|| field(3 * pw + 6))?;
        let attributes =
            read_u32_le_opt(bytes, base + 3 * pw + 8).ok_or_else(|| field(3 * pw + 8))?;

        entries.push(HandleTableEntry {
            // Process ids are 32-bit values carried in a pointer-sized field.
            process_id: pid as u32,
            handle_value: value as usize,
            object_type_index: type_index,
            granted_access: granted,
            object_address: object as usize,
            handle_attributes: attributes,
        });
    }

    Ok(entries)
}
