/// [`HandleBackend`] over the live system.
use super::duplicate::{close_remote, duplicate_into_current};
use super::handle::OwnedHandle;
use super::remote::RemoteNameQuerier;
use super::{drives, snapshot};
use crate::backend::{Duplication, HandleBackend, NameQuery};
use crate::error::HandleError;
use crate::model::{HandleRef, HandleTableEntry};
use crate::nt::ObjectTypeRegistry;
use crate::ntpath::NtPathTable;
use std::time::Duration;

/// Native Windows backend.
pub struct NativeBackend {
    types: &'static ObjectTypeRegistry,
    querier: RemoteNameQuerier,
}

impl NativeBackend {
    /// Capture the object type registry (once per process) and set up the
    /// name querier.
    pub fn new() -> Result<Self, HandleError> {
        Ok(Self {
            types: snapshot::object_type_registry()?,
            querier: RemoteNameQuerier::new()?,
        })
    }
}

impl HandleBackend for NativeBackend {
    type Local = OwnedHandle;

    fn enumerate_handles(&self) -> Result<Vec<HandleTableEntry>, HandleError> {
        snapshot::enumerate_handles()
    }

    fn object_types(&self) -> Result<&ObjectTypeRegistry, HandleError> {
        Ok(self.types)
    }

    fn device_map(&self) -> Result<NtPathTable, HandleError> {
        drives::device_map()
    }

    fn duplicate_handle(
        &self,
        entry: &HandleTableEntry,
    ) -> Result<Duplication<OwnedHandle>, HandleError> {
        duplicate_into_current(entry)
    }

    fn query_object_name_with_timeout(
        &mut self,
        local: &OwnedHandle,
        timeout: Duration,
    ) -> Result<NameQuery, HandleError> {
        self.querier.query(local, timeout)
    }

    fn close_remote_handle(&self, target: &HandleRef) -> Result<(), HandleError> {
        close_remote(target)
    }
}
