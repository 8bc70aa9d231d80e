//! Recent Files
//!
//! Bounded list of documents the user has opened, most recent first, kept
//! under a single key. Re-opening a document moves it to the front instead
//! of adding a second entry.
//!
//! Storage failures never reach the caller: reads fall back to an empty
//! list and failed writes leave the stored list as it was.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use smartpdf_model::{DocumentId, DocumentRef};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::StorageResult;
use crate::keys;
use crate::kv::KeyValueStore;

/// Maximum number of recent files kept by default
pub const DEFAULT_RECENT_CAPACITY: usize = 20;

/// Recent-files cache handle. Clones share the same write gate.
#[derive(Clone)]
pub struct RecentFiles {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    capacity: usize,
    // Serializes read-modify-write cycles on the list key.
    write_gate: Arc<Mutex<()>>,
}

impl RecentFiles {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            capacity: DEFAULT_RECENT_CAPACITY,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Sets the list capacity; values below 1 are raised to 1.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the recent files, most recently opened first.
    pub async fn list(&self) -> Vec<DocumentRef> {
        match self.read().await {
            Ok(files) => files,
            Err(err) => {
                warn!(error = %err, "could not read recent files");
                Vec::new()
            }
        }
    }

    pub async fn get(&self, id: &DocumentId) -> Option<DocumentRef> {
        self.list().await.into_iter().find(|doc| &doc.id == id)
    }

    /// Puts `doc` at the front of the list, stamped with the current time,
    /// or with the newest existing stamp if the clock reads earlier than it.
    ///
    /// Any previous entry with the same id is replaced. The list is capped
    /// at the configured capacity. Returns whether the new list was
    /// persisted.
    pub async fn record_opened(&self, mut doc: DocumentRef) -> bool {
        let _gate = self.write_gate.lock().await;

        let mut files = match self.read().await {
            Ok(files) => files,
            Err(err) => {
                warn!(id = %doc.id, error = %err, "could not read recent files; not recording");
                return false;
            }
        };

        files.retain(|existing| existing.id != doc.id);
        // A clock that stepped backwards must not sort the new entry behind
        // older ones, or truncation would evict it.
        let now = self.clock.now_millis();
        let newest = files.iter().filter_map(|existing| existing.last_opened).max();
        doc.last_opened = Some(newest.map_or(now, |newest| newest.max(now)));
        debug!(id = %doc.id, last_opened = ?doc.last_opened, "recording opened document");
        files.insert(0, doc);
        files.truncate(self.capacity);

        self.write(&files).await
    }

    /// Fills in render-time details without changing the order.
    ///
    /// `None` arguments leave the existing value alone. Returns false when
    /// the document is not in the list or the write failed.
    pub async fn record_rendered(
        &self,
        id: &DocumentId,
        page_count: Option<u32>,
        thumbnail: Option<String>,
    ) -> bool {
        let _gate = self.write_gate.lock().await;

        let mut files = match self.read().await {
            Ok(files) => files,
            Err(err) => {
                warn!(id = %id, error = %err, "could not read recent files; not updating");
                return false;
            }
        };

        let Some(doc) = files.iter_mut().find(|doc| &doc.id == id) else {
            return false;
        };
        if page_count.is_some() {
            doc.page_count = page_count;
        }
        if thumbnail.is_some() {
            doc.thumbnail = thumbnail;
        }

        self.write(&files).await
    }

    /// Drops `id` from the list. Removing an unknown id is a successful no-op.
    pub async fn remove(&self, id: &DocumentId) -> bool {
        let _gate = self.write_gate.lock().await;

        let mut files = match self.read().await {
            Ok(files) => files,
            Err(err) => {
                warn!(id = %id, error = %err, "could not read recent files; not removing");
                return false;
            }
        };

        let before = files.len();
        files.retain(|doc| &doc.id != id);
        if files.len() == before {
            return true;
        }

        self.write(&files).await
    }

    /// Deletes the stored list entirely.
    pub async fn clear(&self) -> bool {
        let _gate = self.write_gate.lock().await;

        match self.store.remove(keys::RECENT_FILES).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "could not clear recent files");
                false
            }
        }
    }

    /// Loads and normalizes the stored list.
    ///
    /// Malformed JSON counts as an empty list; I/O failures are returned so
    /// mutations can refuse to overwrite a list they could not read.
    async fn read(&self) -> StorageResult<Vec<DocumentRef>> {
        let Some(raw) = self.store.get(keys::RECENT_FILES).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<DocumentRef>>(&raw) {
            Ok(mut files) => {
                normalize(&mut files, self.capacity);
                Ok(files)
            }
            Err(err) => {
                warn!(error = %err, "recent files entry is corrupt; treating as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn write(&self, files: &[DocumentRef]) -> bool {
        let json = match serde_json::to_string(files) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "could not serialize recent files");
                return false;
            }
        };

        match self.store.set(keys::RECENT_FILES, &json).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "could not persist recent files");
                false
            }
        }
    }
}

/// Stable sort, newest `last_opened` first; entries without one go last.
fn sort_by_recency(files: &mut [DocumentRef]) {
    files.sort_by_key(|doc| Reverse(doc.last_opened.unwrap_or(i64::MIN)));
}

/// Sorts, drops duplicate ids (keeping the most recent) and caps the list.
fn normalize(files: &mut Vec<DocumentRef>, capacity: usize) {
    sort_by_recency(files);
    let mut seen = HashSet::new();
    files.retain(|doc| seen.insert(doc.id.clone()));
    files.truncate(capacity);
}
