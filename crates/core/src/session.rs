//! Session context
//!
//! Process-lifetime state shared by every screen: the open document, the OCR
//! results gathered for it and its annotation history, plus a snapshot of the
//! recent-files list. All persistence goes through the storage caches; when
//! a [`Replicator`] is attached, successful local writes are also mirrored
//! remotely.
//!
//! A `SessionContext` is a handle. Clones share the same state, so the
//! application root builds one and hands clones to whoever needs it.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use smartpdf_model::{Annotation, AnnotationId, DocumentId, DocumentRef, OcrResult, PickedFile, Settings};
use smartpdf_storage::{
    Clock, KeyValueStore, OcrCache, RecentFiles, SettingsStore, StorageConfig, SystemClock,
};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::history::AnnotationHistory;
use crate::mirror::Replicator;

#[derive(Debug, Default)]
struct SessionState {
    current: Option<DocumentRef>,
    ocr_results: BTreeMap<u32, OcrResult>,
    annotations: AnnotationHistory,
    recent_files: Vec<DocumentRef>,
}

impl SessionState {
    fn is_current(&self, id: &DocumentId) -> bool {
        self.current.as_ref().is_some_and(|doc| &doc.id == id)
    }

    fn install(&mut self, doc: Option<DocumentRef>) {
        self.current = doc;
        self.ocr_results.clear();
        self.annotations = AnnotationHistory::new();
    }
}

#[derive(Clone)]
pub struct SessionContext {
    state: Arc<RwLock<SessionState>>,
    recent: RecentFiles,
    ocr_cache: OcrCache,
    settings: SettingsStore,
    clock: Arc<dyn Clock>,
    replicator: Option<Replicator>,
    mirror_tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl SessionContext {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::default(),
            recent: RecentFiles::new(Arc::clone(&store), Arc::clone(&clock)),
            ocr_cache: OcrCache::new(Arc::clone(&store)),
            settings: SettingsStore::new(store),
            clock,
            replicator: None,
            mirror_tasks: Arc::default(),
        }
    }

    /// Session over the file-backed store described by `config`.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(Arc::new(config.file_store()), Arc::new(SystemClock))
            .with_recent_capacity(config.recent_capacity)
    }

    pub fn with_recent_capacity(mut self, capacity: usize) -> Self {
        self.recent = self.recent.with_capacity(capacity);
        self
    }

    pub fn with_replicator(mut self, replicator: Replicator) -> Self {
        self.replicator = Some(replicator);
        self
    }

    pub fn recent_cache(&self) -> &RecentFiles {
        &self.recent
    }

    pub fn ocr_cache(&self) -> &OcrCache {
        &self.ocr_cache
    }

    pub fn settings_store(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn replicator(&self) -> Option<&Replicator> {
        self.replicator.as_ref()
    }

    // ---- current document ----

    /// Installs `doc` as the current document.
    ///
    /// OCR results and annotations of the previous document are dropped.
    pub async fn open(&self, doc: DocumentRef) {
        debug!(id = %doc.id, name = %doc.name, "opening document");
        self.state.write().await.install(Some(doc));
    }

    /// Records `doc` in the recent files and opens it.
    ///
    /// Returns the document as opened, carrying the stored `last_opened`
    /// stamp when the recent-files write succeeded.
    pub async fn open_recent(&self, doc: DocumentRef) -> DocumentRef {
        let id = doc.id.clone();
        self.add_recent_file(doc.clone()).await;

        let stored = self.state.read().await.recent_files.iter().find(|d| d.id == id).cloned();
        let doc = stored.unwrap_or(doc);
        self.open(doc.clone()).await;
        doc
    }

    /// Creates a document for a freshly picked file, with a new id, then
    /// records and opens it.
    pub async fn open_picked(&self, file: PickedFile) -> DocumentRef {
        let doc = DocumentRef::from_picked(file, self.clock.now_millis());
        self.open_recent(doc).await
    }

    pub async fn close(&self) {
        let mut state = self.state.write().await;
        if let Some(doc) = &state.current {
            debug!(id = %doc.id, "closing document");
        }
        state.install(None);
    }

    pub async fn current_document(&self) -> Option<DocumentRef> {
        self.state.read().await.current.clone()
    }

    /// Fills in render details for the current document and its recent-files
    /// entry. Returns whether the entry was persisted.
    pub async fn document_rendered(&self, page_count: u32, thumbnail: Option<String>) -> bool {
        let id = {
            let mut state = self.state.write().await;
            let Some(doc) = state.current.as_mut() else {
                return false;
            };
            doc.page_count = Some(page_count);
            if thumbnail.is_some() {
                doc.thumbnail = thumbnail.clone();
            }
            doc.id.clone()
        };

        let persisted = self.recent.record_rendered(&id, Some(page_count), thumbnail).await;
        let files = self.refresh_recent_files().await;
        if persisted {
            if let Some(entry) = files.iter().find(|d| d.id == id) {
                self.mirror(|r| r.document_opened(entry)).await;
            }
        }
        persisted
    }

    // ---- OCR ----

    /// Stores `result` for `page` of the current session. Not persisted.
    pub async fn record_ocr(&self, page: u32, mut result: OcrResult) {
        result.page_number = page;
        self.state.write().await.ocr_results.insert(page, result);
    }

    /// Like [`record_ocr`](Self::record_ocr), but only if `id` is still the
    /// current document. Returns whether the result was kept.
    pub async fn record_ocr_for(&self, id: &DocumentId, page: u32, mut result: OcrResult) -> bool {
        let mut state = self.state.write().await;
        if !state.is_current(id) {
            debug!(id = %id, page, "document no longer open; dropping ocr result");
            return false;
        }

        result.page_number = page;
        state.ocr_results.insert(page, result);
        true
    }

    pub async fn ocr_result(&self, page: u32) -> Option<OcrResult> {
        self.state.read().await.ocr_results.get(&page).cloned()
    }

    /// Session OCR results in page order.
    pub async fn ocr_results(&self) -> Vec<OcrResult> {
        self.state.read().await.ocr_results.values().cloned().collect()
    }

    /// Pulls cached OCR results for the current document into the session.
    ///
    /// Pages already present in the session are kept. Returns the number of
    /// pages loaded.
    pub async fn load_ocr_from_cache(&self) -> usize {
        let Some(id) = self.current_id().await else {
            return 0;
        };
        let Some(cached) = self.ocr_cache.get_all(&id).await else {
            return 0;
        };

        let mut state = self.state.write().await;
        if !state.is_current(&id) {
            return 0;
        }

        let mut loaded = 0;
        for result in cached {
            if let Entry::Vacant(slot) = state.ocr_results.entry(result.page_number) {
                slot.insert(result);
                loaded += 1;
            }
        }
        debug!(id = %id, loaded, "loaded ocr results from cache");
        loaded
    }

    /// Merges the session's OCR results into the document's cache entry.
    ///
    /// Returns false when no document is open or the write failed. With no
    /// results there is nothing to write and the call succeeds.
    pub async fn persist_ocr(&self) -> bool {
        let (id, results) = {
            let state = self.state.read().await;
            let Some(doc) = &state.current else {
                return false;
            };
            (doc.id.clone(), state.ocr_results.values().cloned().collect::<Vec<_>>())
        };
        if results.is_empty() {
            return true;
        }

        let persisted = self.ocr_cache.merge_all(&id, &results).await;
        if persisted {
            self.mirror_ocr(&id, &results).await;
        }
        persisted
    }

    pub(crate) async fn mirror_ocr(&self, id: &DocumentId, results: &[OcrResult]) {
        self.mirror(|r| r.ocr_saved(id, results)).await;
    }

    /// Drops every cached OCR entry for `id`.
    pub async fn clear_ocr_cache(&self, id: &DocumentId) -> bool {
        self.ocr_cache.clear_document(id).await
    }

    // ---- annotations ----

    pub async fn annotations(&self) -> Vec<Annotation> {
        self.state.read().await.annotations.current().to_vec()
    }

    pub async fn add_annotation(&self, annotation: Annotation) {
        self.state.write().await.annotations.add(annotation);
    }

    pub async fn remove_annotation(&self, id: AnnotationId) -> bool {
        self.state.write().await.annotations.remove(id)
    }

    /// Replaces all annotations as one undoable step.
    pub async fn set_annotations(&self, annotations: Vec<Annotation>) {
        self.state.write().await.annotations.replace_all(annotations);
    }

    pub async fn clear_annotations(&self) {
        self.state.write().await.annotations.clear();
    }

    pub async fn undo(&self) -> bool {
        self.state.write().await.annotations.undo()
    }

    pub async fn redo(&self) -> bool {
        self.state.write().await.annotations.redo()
    }

    pub async fn can_undo(&self) -> bool {
        self.state.read().await.annotations.can_undo()
    }

    pub async fn can_redo(&self) -> bool {
        self.state.read().await.annotations.can_redo()
    }

    // ---- recent files ----

    /// Last snapshot of the recent-files list.
    pub async fn recent_files(&self) -> Vec<DocumentRef> {
        self.state.read().await.recent_files.clone()
    }

    /// Re-reads the recent-files cache into the shared snapshot.
    pub async fn refresh_recent_files(&self) -> Vec<DocumentRef> {
        let files = self.recent.list().await;
        self.state.write().await.recent_files = files.clone();
        files
    }

    pub async fn add_recent_file(&self, doc: DocumentRef) -> bool {
        let id = doc.id.clone();
        let persisted = self.recent.record_opened(doc).await;
        let files = self.refresh_recent_files().await;

        if persisted {
            if let Some(entry) = files.iter().find(|d| d.id == id) {
                self.mirror(|r| r.document_opened(entry)).await;
            }
        }
        persisted
    }

    /// Removes `id` from the recent files. Its OCR cache is kept.
    pub async fn remove_recent_file(&self, id: &DocumentId) -> bool {
        let persisted = self.recent.remove(id).await;
        self.refresh_recent_files().await;

        if persisted {
            self.mirror(|r| r.document_removed(id)).await;
        }
        persisted
    }

    pub async fn clear_recent_files(&self) -> bool {
        let cleared = self.recent.clear().await;
        self.refresh_recent_files().await;
        cleared
    }

    // ---- settings ----

    pub async fn settings(&self) -> Settings {
        self.settings.get_all().await
    }

    pub async fn update_setting(&self, key: &str, value: impl Into<Value>) -> bool {
        self.settings.set(key, value.into()).await
    }

    pub async fn replace_settings(&self, settings: &Settings) -> bool {
        self.settings.replace(settings).await
    }

    // ---- remote mirror ----

    /// Waits for every remote write started so far.
    pub async fn flush_mirror(&self) {
        let tasks: Vec<_> = self.mirror_tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "remote mirror task did not finish");
            }
        }
    }

    async fn mirror(&self, start: impl FnOnce(&Replicator) -> Option<JoinHandle<()>>) {
        let Some(task) = self.replicator.as_ref().and_then(start) else {
            return;
        };

        let mut tasks = self.mirror_tasks.lock().await;
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    async fn current_id(&self) -> Option<DocumentId> {
        self.state.read().await.current.as_ref().map(|doc| doc.id.clone())
    }
}
