/// In-memory [`HandleBackend`] for exercising the catalog without a live
/// system.
///
/// Each scripted handle carries a [`FakeObject`] describing how duplication
/// and the name query behave for it. The backend records how many duplicates
/// are alive at once, every name query it served, and every handle closed
/// through it.
///
/// A [`FakeObject::Hangs`] query runs on a real thread that never completes
/// on its own; the backend abandons it after the timeout exactly like the
/// native querier, and keeps the thread parked until the backend is dropped.
use super::{Duplication, HandleBackend, NameQuery, SkipReason, Unnamed};
use crate::error::HandleError;
use crate::model::{HandleRef, HandleTableEntry};
use crate::nt::{NtStatus, ObjectTypeDescriptor, ObjectTypeRegistry};
use crate::ntpath::NtPathTable;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Scripted behaviour of one remote handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeObject {
    /// Duplicates fine and reports this NT path.
    Named(String),
    /// Duplicates fine; the name query completes with this status.
    Status(NtStatus),
    /// Duplicates fine; the name query never completes.
    Hangs,
    /// Duplication is skipped for this reason.
    Unduplicable(SkipReason),
}

#[derive(Debug, Clone)]
struct FakeHandle {
    entry: HandleTableEntry,
    object: FakeObject,
}

#[derive(Default)]
struct FakeState {
    open_duplicates: usize,
    peak_duplicates: usize,
    name_queries: usize,
    closed: Vec<HandleRef>,
    closed_set: HashSet<HandleRef>,
    /// Release senders for abandoned queries. Dropping them lets the parked
    /// threads exit.
    abandoned: Vec<Sender<()>>,
}

/// Scripted handle backend.
pub struct FakeBackend {
    handles: Vec<FakeHandle>,
    descriptors: Vec<ObjectTypeDescriptor>,
    types: ObjectTypeRegistry,
    devices: NtPathTable,
    snapshot_failure: Option<NtStatus>,
    state: Arc<Mutex<FakeState>>,
}

/// Duplicate handed out by [`FakeBackend`].
pub struct FakeLocal {
    target: HandleRef,
    state: Arc<Mutex<FakeState>>,
}

impl Drop for FakeLocal {
    fn drop(&mut self) {
        self.state.lock().open_duplicates -= 1;
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    /// An empty system: no handles, no types, no drives.
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
            descriptors: Vec::new(),
            types: ObjectTypeRegistry::default(),
            devices: NtPathTable::new(),
            snapshot_failure: None,
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    /// Register the object types most tests need, with realistic indices.
    pub fn with_standard_types(self) -> Self {
        self.with_type(3, "Directory")
            .with_type(7, "Process")
            .with_type(16, "Event")
            .with_type(37, "File")
            .with_type(40, "Section")
    }

    /// Register an object type. A repeated index replaces the earlier name.
    pub fn with_type(mut self, type_index: u16, type_name: &str) -> Self {
        self.descriptors.retain(|d| d.type_index != type_index);
        self.descriptors.push(ObjectTypeDescriptor {
            type_index,
            type_name: type_name.into(),
        });
        self.types = ObjectTypeRegistry::from_descriptors(self.descriptors.iter().cloned());
        self
    }

    /// Mount `device` as `drive`.
    pub fn with_device(mut self, device: &str, drive: &str) -> Self {
        self.devices.insert(device, drive);
        self
    }

    /// Add a handle to the snapshot.
    pub fn with_handle(
        mut self,
        process_id: u32,
        handle_value: usize,
        object_type_index: u16,
        object: FakeObject,
    ) -> Self {
        let entry = HandleTableEntry {
            process_id,
            handle_value,
            object_type_index,
            granted_access: 0x0012_0089,
            object_address: 0xFFFF_8000_0000_0000_u64 as usize
                | (self.handles.len() + 1) << 4,
            handle_attributes: 0,
        };
        self.handles.push(FakeHandle { entry, object });
        self
    }

    /// Make every snapshot attempt fail with `status`.
    pub fn with_snapshot_failure(mut self, status: NtStatus) -> Self {
        self.snapshot_failure = Some(status);
        self
    }

    /// Most duplicates that were alive at the same time.
    pub fn peak_duplicates(&self) -> usize {
        self.state.lock().peak_duplicates
    }

    /// Duplicates currently alive.
    pub fn open_duplicates(&self) -> usize {
        self.state.lock().open_duplicates
    }

    /// Name queries served so far.
    pub fn name_queries(&self) -> usize {
        self.state.lock().name_queries
    }

    /// Queries abandoned at the timeout.
    pub fn abandoned_queries(&self) -> usize {
        self.state.lock().abandoned.len()
    }

    /// Handles closed through [`HandleBackend::close_remote_handle`], in order.
    pub fn closed_handles(&self) -> Vec<HandleRef> {
        self.state.lock().closed.clone()
    }

    fn find(&self, target: &HandleRef) -> Option<&FakeHandle> {
        self.handles
            .iter()
            .find(|h| h.entry.handle_ref() == *target)
    }

    /// Run a query that never finishes on its own, abandoning it after
    /// `timeout`.
    fn hanging_query(&self, timeout: Duration) -> Result<NameQuery, HandleError> {
        let (release_tx, release_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = bounded::<NtStatus>(1);

        std::thread::Builder::new()
            .name("locksleuth-fake-query".into())
            .spawn(move || {
                // Returns once the backend drops the release sender.
                let _ = release_rx.recv();
                let _ = done_tx.send(NtStatus::PENDING);
            })
            .map_err(|e| HandleError::win32("CreateThread", e))?;

        match done_rx.recv_timeout(timeout) {
            Ok(status) => NameQuery::from_status(status, || Ok(None)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                self.state.lock().abandoned.push(release_tx);
                Ok(NameQuery::Unnamed(Unnamed::TimedOut))
            }
        }
    }
}

impl HandleBackend for FakeBackend {
    type Local = FakeLocal;

    fn enumerate_handles(&self) -> Result<Vec<HandleTableEntry>, HandleError> {
        if let Some(status) = self.snapshot_failure {
            return Err(HandleError::Snapshot { status });
        }
        let state = self.state.lock();
        Ok(self
            .handles
            .iter()
            .map(|h| h.entry)
            .filter(|e| !state.closed_set.contains(&e.handle_ref()))
            .collect())
    }

    fn object_types(&self) -> Result<&ObjectTypeRegistry, HandleError> {
        Ok(&self.types)
    }

    fn device_map(&self) -> Result<NtPathTable, HandleError> {
        Ok(self.devices.clone())
    }

    fn duplicate_handle(
        &self,
        entry: &HandleTableEntry,
    ) -> Result<Duplication<FakeLocal>, HandleError> {
        let target = entry.handle_ref();
        let Some(handle) = self.find(&target) else {
            return Ok(Duplication::Skipped(SkipReason::InvalidHandle));
        };
        if let FakeObject::Unduplicable(reason) = handle.object {
            return Ok(Duplication::Skipped(reason));
        }
        if self.state.lock().closed_set.contains(&target) {
            return Ok(Duplication::Skipped(SkipReason::InvalidHandle));
        }

        let mut state = self.state.lock();
        state.open_duplicates += 1;
        state.peak_duplicates = state.peak_duplicates.max(state.open_duplicates);
        Ok(Duplication::Duplicated(FakeLocal {
            target,
            state: Arc::clone(&self.state),
        }))
    }

    fn query_object_name_with_timeout(
        &mut self,
        local: &FakeLocal,
        timeout: Duration,
    ) -> Result<NameQuery, HandleError> {
        self.state.lock().name_queries += 1;

        let object = self
            .find(&local.target)
            .map(|h| h.object.clone())
            .unwrap_or(FakeObject::Status(NtStatus::INVALID_HANDLE));

        match object {
            FakeObject::Named(name) => NameQuery::from_status(NtStatus::SUCCESS, || {
                let trimmed = name.trim_end_matches('\0');
                Ok((!trimmed.is_empty()).then(|| trimmed.to_owned()))
            }),
            FakeObject::Status(status) => NameQuery::from_status(status, || Ok(None)),
            FakeObject::Hangs => self.hanging_query(timeout),
            FakeObject::Unduplicable(_) => {
                NameQuery::from_status(NtStatus::INVALID_HANDLE, || Ok(None))
            }
        }
    }

    fn close_remote_handle(&self, target: &HandleRef) -> Result<(), HandleError> {
        let mut state = self.state.lock();
        if self.find(target).is_none() || state.closed_set.contains(target) {
            return Err(HandleError::win32("DuplicateHandle", "The handle is invalid."));
        }
        state.closed_set.insert(*target);
        state.closed.push(*target);
        Ok(())
    }
}
