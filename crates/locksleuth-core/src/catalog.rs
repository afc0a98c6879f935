/// File handle catalog. Drives one discovery pass over a [`HandleBackend`].
///
/// # Pipeline
///
/// 1. Snapshot the system handle table (fatal on failure).
/// 2. Keep only entries whose type resolves to `File` or `Directory`.
/// 3. Duplicate each remote handle locally.
/// 4. Query the object name with a hard timeout.
/// 5. Translate the NT device prefix to a drive letter; drop unmapped paths.
/// 6. Keep only paths under the optional filter.
///
/// Entries that drop out at steps 3 to 6 are skipped silently. Entries are
/// processed in snapshot order, one at a time, and each duplicate is
/// released before the next entry is touched.
use crate::backend::{Duplication, HandleBackend, NameQuery, Unnamed};
use crate::error::HandleError;
use crate::model::{FileHandleInfo, FileObjectKind, HandleRef, HandleTableEntry};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How long a single name query may run before its thread is abandoned.
pub const NAME_QUERY_TIMEOUT: Duration = Duration::from_millis(125);

/// Tunables for a [`FileHandleCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogOptions {
    /// Upper bound on each name query. The worst-case pass duration is this
    /// times the number of file-typed entries.
    pub name_query_timeout: Duration,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            name_query_timeout: NAME_QUERY_TIMEOUT,
        }
    }
}

/// Case-insensitive drive-letter path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFilter {
    prefix: String,
}

impl PathFilter {
    /// Build a filter; `/` is treated as `\`. Returns `None` for an empty
    /// prefix, which matches everything.
    pub fn new(prefix: &str) -> Option<Self> {
        if prefix.is_empty() {
            return None;
        }
        Some(Self {
            prefix: prefix.replace('/', "\\").to_lowercase(),
        })
    }

    /// `true` if `dos_path` starts with the prefix, ignoring case.
    pub fn matches(&self, dos_path: &str) -> bool {
        dos_path.to_lowercase().starts_with(&self.prefix)
    }
}

/// Per-pass counters, logged once at the end of a pass.
#[derive(Debug, Default)]
struct PassStats {
    entries: usize,
    file_typed: usize,
    not_duplicated: usize,
    unnamed: usize,
    timed_out: usize,
    unmapped: usize,
    filtered: usize,
}

/// Open-handle discovery over a backend.
pub struct FileHandleCatalog<B> {
    backend: B,
    options: CatalogOptions,
}

impl<B: HandleBackend> FileHandleCatalog<B> {
    /// Catalog with default options.
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, CatalogOptions::default())
    }

    pub fn with_options(backend: B, options: CatalogOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> CatalogOptions {
        self.options
    }

    /// Every open file or directory handle whose drive-letter path starts
    /// with `path_filter` (case-insensitive), or all of them when no filter
    /// is given.
    ///
    /// Only failures that make the whole pass untrustworthy are returned as
    /// errors: the snapshot or type table cannot be read, or a name query
    /// reports a status outside the known set.
    pub fn get_open_handles(
        &mut self,
        path_filter: Option<&str>,
    ) -> Result<Vec<FileHandleInfo>, HandleError> {
        let start = Instant::now();
        let filter = path_filter.and_then(PathFilter::new);
        let mut stats = PassStats::default();

        let entries = self.backend.enumerate_handles()?;
        stats.entries = entries.len();

        let candidates: Vec<(HandleTableEntry, FileObjectKind)> = {
            let types = self.backend.object_types()?;
            entries
                .into_iter()
                .filter_map(|entry| {
                    let kind = types
                        .resolve(entry.object_type_index)
                        .and_then(FileObjectKind::from_type_name)?;
                    Some((entry, kind))
                })
                .collect()
        };
        stats.file_typed = candidates.len();

        let devices = self.backend.device_map()?;
        let mut open = Vec::new();

        for (entry, kind) in candidates {
            let Some(nt_path) = self.query_entry_name(&entry, &mut stats)? else {
                continue;
            };
            let Some(dos_path) = devices.to_dos_path(&nt_path) else {
                stats.unmapped += 1;
                continue;
            };
            if let Some(filter) = &filter {
                if !filter.matches(&dos_path) {
                    stats.filtered += 1;
                    continue;
                }
            }

            open.push(FileHandleInfo {
                process_id: entry.process_id,
                handle_value: entry.handle_value,
                granted_access: entry.granted_access,
                dos_path,
                nt_path,
                object_type_name: kind,
            });
        }

        info!(
            "Handle pass: {} entries, {} file-typed, {} reported in {:?}",
            stats.entries,
            stats.file_typed,
            open.len(),
            start.elapsed(),
        );
        debug!(
            not_duplicated = stats.not_duplicated,
            unnamed = stats.unnamed,
            timed_out = stats.timed_out,
            unmapped = stats.unmapped,
            filtered = stats.filtered,
            "Handle pass skips"
        );

        Ok(open)
    }

    /// Duplicate one entry, query its name, and release the duplicate.
    fn query_entry_name(
        &mut self,
        entry: &HandleTableEntry,
        stats: &mut PassStats,
    ) -> Result<Option<String>, HandleError> {
        let local = match self.backend.duplicate_handle(entry)? {
            Duplication::Duplicated(local) => local,
            Duplication::Skipped(reason) => {
                debug!(
                    pid = entry.process_id,
                    handle = entry.handle_value,
                    ?reason,
                    "Skipping handle: not duplicated"
                );
                stats.not_duplicated += 1;
                return Ok(None);
            }
        };

        let outcome = self
            .backend
            .query_object_name_with_timeout(&local, self.options.name_query_timeout);
        drop(local);

        match outcome? {
            NameQuery::Named(name) => Ok(Some(name)),
            NameQuery::Unnamed(why) => {
                if why == Unnamed::TimedOut {
                    stats.timed_out += 1;
                } else {
                    stats.unnamed += 1;
                }
                debug!(
                    pid = entry.process_id,
                    handle = entry.handle_value,
                    ?why,
                    "Skipping handle: no name"
                );
                Ok(None)
            }
        }
    }

    /// Close each handle inside its owning process. Best-effort: a failure
    /// is logged and the remaining entries are still processed.
    pub fn close_handles(&self, entries: &[HandleRef]) {
        for target in entries {
            match self.backend.close_remote_handle(target) {
                Ok(()) => debug!(
                    pid = target.process_id,
                    handle = target.handle_value,
                    "Closed remote handle"
                ),
                Err(e) => debug!(
                    pid = target.process_id,
                    handle = target.handle_value,
                    "Could not close remote handle: {e}"
                ),
            }
        }
    }
}
