/// Caller-facing output of a discovery pass.
use crate::model::HandleRef;
use serde::{Deserialize, Serialize};

/// Object kinds that can be reported. Every other kernel object type is
/// dropped before any per-entry work happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileObjectKind {
    File,
    Directory,
}

impl FileObjectKind {
    /// Map a kernel object type name to a reportable kind.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "File" => Some(Self::File),
            "Directory" => Some(Self::Directory),
            _ => None,
        }
    }

    /// The kernel object type name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "File",
            Self::Directory => "Directory",
        }
    }
}

/// An open file or directory handle resolved to a drive-letter path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandleInfo {
    pub process_id: u32,
    pub handle_value: usize,
    pub granted_access: u32,
    /// Drive-letter path, e.g. `C:\Users\test\locked.txt`.
    pub dos_path: String,
    /// Kernel device path, e.g. `\Device\HarddiskVolume1\Users\test\locked.txt`.
    pub nt_path: String,
    pub object_type_name: FileObjectKind,
}

impl FileHandleInfo {
    /// Identity of the underlying handle, suitable for closing it.
    pub fn handle_ref(&self) -> HandleRef {
        HandleRef {
            process_id: self.process_id,
            handle_value: self.handle_value,
        }
    }
}

impl From<&FileHandleInfo> for HandleRef {
    fn from(info: &FileHandleInfo) -> Self {
        info.handle_ref()
    }
}
