//! OCR result cache.
//!
//! The whole-document entry (`ocr_cache_<documentId>`, a JSON array of page
//! results) is the canonical representation: it keeps confidence and page
//! number and is what the session loads and saves. The per-page plain-text
//! entries (`ocr_cache_<documentId>_<page>`) are still readable and writable
//! for data written by earlier app versions, but the two are never
//! reconciled: writing one does not touch the other.

use std::collections::BTreeMap;
use std::sync::Arc;

use smartpdf_model::{DocumentId, OcrResult};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StorageResult;
use crate::keys;
use crate::kv::{self, KeyValueStore};

#[derive(Clone)]
pub struct OcrCache {
    store: Arc<dyn KeyValueStore>,
    write_gate: Arc<Mutex<()>>,
}

impl OcrCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, write_gate: Arc::new(Mutex::new(())) }
    }

    /// Legacy per-page text, or `None` on a miss.
    pub async fn get_page(&self, id: &DocumentId, page: u32) -> Option<String> {
        if page == 0 {
            return None;
        }

        let key = keys::ocr_page(id, page);
        match self.store.get(&key).await {
            Ok(text) => {
                debug!(key = %key, hit = text.is_some(), "ocr page lookup");
                text
            }
            Err(err) => {
                warn!(key = %key, error = %err, "could not read cached page text");
                None
            }
        }
    }

    /// Stores legacy per-page text, overwriting any earlier value.
    pub async fn set_page(&self, id: &DocumentId, page: u32, text: &str) -> bool {
        if page == 0 {
            warn!(id = %id, "page numbers are 1-based; not caching page 0");
            return false;
        }

        let key = keys::ocr_page(id, page);
        match self.store.set(&key, text).await {
            Ok(()) => true,
            Err(err) => {
                warn!(key = %key, error = %err, "could not cache page text");
                false
            }
        }
    }

    /// All cached results for a document, ordered by page.
    ///
    /// `None` when nothing is cached, the entry is corrupt or the read failed.
    pub async fn get_all(&self, id: &DocumentId) -> Option<Vec<OcrResult>> {
        match self.read_document(id).await {
            Ok(results) => results,
            Err(err) => {
                warn!(id = %id, error = %err, "could not read cached ocr results");
                None
            }
        }
    }

    /// The canonical result for one page, if cached.
    pub async fn get_result(&self, id: &DocumentId, page: u32) -> Option<OcrResult> {
        self.get_all(id).await?.into_iter().find(|result| result.page_number == page)
    }

    /// Replaces the whole-document entry.
    ///
    /// Stored with one result per page (the last one given wins), sorted by
    /// page number.
    pub async fn save_all(&self, id: &DocumentId, results: &[OcrResult]) -> bool {
        let _gate = self.write_gate.lock().await;
        self.write_document(id, by_page(results.iter().cloned())).await
    }

    /// Adds or replaces a single page inside the whole-document entry.
    pub async fn merge_result(&self, id: &DocumentId, result: OcrResult) -> bool {
        let _gate = self.write_gate.lock().await;

        let existing = match self.read_document(id).await {
            Ok(existing) => existing.unwrap_or_default(),
            Err(err) => {
                warn!(id = %id, error = %err, "could not read cached ocr results; not merging");
                return false;
            }
        };

        let merged = by_page(existing.into_iter().chain(std::iter::once(result)));
        self.write_document(id, merged).await
    }

    /// Adds or replaces several pages inside the whole-document entry,
    /// leaving other cached pages alone.
    pub async fn merge_all(&self, id: &DocumentId, results: &[OcrResult]) -> bool {
        let _gate = self.write_gate.lock().await;

        let existing = match self.read_document(id).await {
            Ok(existing) => existing.unwrap_or_default(),
            Err(err) => {
                warn!(id = %id, error = %err, "could not read cached ocr results; not merging");
                return false;
            }
        };

        let merged = by_page(existing.into_iter().chain(results.iter().cloned()));
        self.write_document(id, merged).await
    }

    /// Removes every cached entry for one document, both representations.
    pub async fn clear_document(&self, id: &DocumentId) -> bool {
        let _gate = self.write_gate.lock().await;

        let keys = match self.store.list_keys().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(id = %id, error = %err, "could not list ocr cache keys");
                return false;
            }
        };

        let document_key = keys::ocr_document(id);
        let doomed = keys
            .into_iter()
            .filter(|key| *key == document_key || keys::is_ocr_page_of(key, id));

        match kv::remove_all(self.store.as_ref(), doomed).await {
            Ok(removed) => {
                debug!(id = %id, removed, "cleared ocr cache for document");
                true
            }
            Err(err) => {
                warn!(id = %id, error = %err, "could not fully clear ocr cache for document");
                false
            }
        }
    }

    /// Removes everything under the OCR namespace.
    ///
    /// A key that cannot be removed does not stop the others from going.
    pub async fn clear_cache(&self) -> bool {
        let _gate = self.write_gate.lock().await;

        match self.store.remove_matching_prefix(keys::OCR_CACHE_PREFIX).await {
            Ok(removed) => {
                debug!(removed, "cleared ocr cache");
                true
            }
            Err(err) => {
                warn!(error = %err, "could not fully clear ocr cache");
                false
            }
        }
    }

    async fn read_document(&self, id: &DocumentId) -> StorageResult<Option<Vec<OcrResult>>> {
        let key = keys::ocr_document(id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<Vec<OcrResult>>(&raw) {
            Ok(results) => Ok(Some(by_page(results))),
            Err(err) => {
                warn!(key = %key, error = %err, "cached ocr results are corrupt; ignoring");
                Ok(None)
            }
        }
    }

    async fn write_document(&self, id: &DocumentId, results: Vec<OcrResult>) -> bool {
        let key = keys::ocr_document(id);
        let json = match serde_json::to_string(&results) {
            Ok(json) => json,
            Err(err) => {
                warn!(key = %key, error = %err, "could not serialize ocr results");
                return false;
            }
        };

        match self.store.set(&key, &json).await {
            Ok(()) => true,
            Err(err) => {
                warn!(key = %key, error = %err, "could not persist ocr results");
                false
            }
        }
    }
}

/// One result per page, later entries replacing earlier ones, page order.
fn by_page(results: impl IntoIterator<Item = OcrResult>) -> Vec<OcrResult> {
    results
        .into_iter()
        .map(|result| (result.page_number, result))
        .collect::<BTreeMap<_, _>>()
        .into_values()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    fn cache() -> (OcrCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (OcrCache::new(store.clone()), store)
    }

    #[tokio::test]
    async fn page_text_round_trip_and_miss() {
        let (cache, _) = cache();
        let doc = DocumentId::new("docX");

        assert!(cache.set_page(&doc, 1, "hello").await);

        assert_eq!(cache.get_page(&doc, 1).await.as_deref(), Some("hello"));
        assert_eq!(cache.get_page(&doc, 2).await, None);
    }

    #[tokio::test]
    async fn page_text_is_overwritten() {
        let (cache, _) = cache();
        let doc = DocumentId::new("d");

        cache.set_page(&doc, 3, "first").await;
        cache.set_page(&doc, 3, "second").await;

        assert_eq!(cache.get_page(&doc, 3).await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn empty_text_is_a_hit() {
        let (cache, _) = cache();
        let doc = DocumentId::new("d");

        cache.set_page(&doc, 1, "").await;

        assert_eq!(cache.get_page(&doc, 1).await.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn page_zero_is_rejected() {
        let (cache, store) = cache();
        let doc = DocumentId::new("d");

        assert!(!cache.set_page(&doc, 0, "x").await);
        assert_eq!(cache.get_page(&doc, 0).await, None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn save_all_dedups_and_orders_pages() {
        let (cache, _) = cache();
        let doc = DocumentId::new("d");
        let results = vec![
            OcrResult::new(3, "three", 0.9),
            OcrResult::new(1, "one", 0.8),
            OcrResult::new(3, "three again", 0.95),
        ];

        assert!(cache.save_all(&doc, &results).await);

        let stored = cache.get_all(&doc).await.expect("cached");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].text, "one");
        assert_eq!(stored[1].text, "three again");
        assert_eq!(cache.get_result(&doc, 3).await.map(|r| r.confidence), Some(0.95));
    }

    #[tokio::test]
    async fn merge_result_adds_and_replaces_pages() {
        let (cache, _) = cache();
        let doc = DocumentId::new("d");

        cache.merge_result(&doc, OcrResult::new(2, "two", 0.5)).await;
        cache.merge_result(&doc, OcrResult::new(1, "one", 0.5)).await;
        cache.merge_result(&doc, OcrResult::new(2, "two v2", 0.9)).await;

        let pages: Vec<(u32, String)> = cache
            .get_all(&doc)
            .await
            .expect("cached")
            .into_iter()
            .map(|r| (r.page_number, r.text))
            .collect();
        assert_eq!(pages, vec![(1, "one".to_owned()), (2, "two v2".to_owned())]);
    }

    #[tokio::test]
    async fn merge_all_keeps_unrelated_pages() {
        let (cache, _) = cache();
        let doc = DocumentId::new("d");
        cache.save_all(&doc, &[OcrResult::new(1, "one", 0.5), OcrResult::new(5, "five", 0.5)]).await;

        assert!(cache.merge_all(&doc, &[OcrResult::new(5, "five v2", 0.9), OcrResult::new(2, "two", 0.9)]).await);

        let texts: Vec<String> =
            cache.get_all(&doc).await.expect("cached").into_iter().map(|r| r.text).collect();
        assert_eq!(texts, ["one", "two", "five v2"]);
    }

    #[tokio::test]
    async fn representations_are_independent() {
        let (cache, _) = cache();
        let doc = DocumentId::new("d");

        cache.set_page(&doc, 1, "legacy").await;
        assert_eq!(cache.get_all(&doc).await, None);

        cache.save_all(&doc, &[OcrResult::new(2, "bulk", 1.0)]).await;
        assert_eq!(cache.get_page(&doc, 2).await, None);
    }

    #[tokio::test]
    async fn corrupt_bulk_entry_is_a_miss() {
        let (cache, store) = cache();
        let doc = DocumentId::new("d");
        store.set(&keys::ocr_document(&doc), "[{\"text\":").await.unwrap();

        assert_eq!(cache.get_all(&doc).await, None);
        assert!(cache.merge_result(&doc, OcrResult::new(1, "fresh", 1.0)).await);
        assert_eq!(cache.get_all(&doc).await.map(|r| r.len()), Some(1));
    }

    #[tokio::test]
    async fn clear_cache_removes_every_ocr_key() {
        let (cache, store) = cache();
        let doc = DocumentId::new("d");
        store.set(keys::RECENT_FILES, "[]").await.unwrap();
        cache.save_all(&doc, &[OcrResult::new(1, "a", 1.0)]).await;
        for page in 1..=3 {
            cache.set_page(&doc, page, "text").await;
        }

        assert!(cache.clear_cache().await);

        assert_eq!(cache.get_all(&doc).await, None);
        for page in 1..=3 {
            assert_eq!(cache.get_page(&doc, page).await, None);
        }
        assert_eq!(store.list_keys().await.unwrap(), vec![keys::RECENT_FILES]);
    }

    #[tokio::test]
    async fn clear_document_leaves_other_documents() {
        let (cache, _) = cache();
        let a = DocumentId::new("a");
        let a_b = DocumentId::new("a_b");

        cache.save_all(&a, &[OcrResult::new(1, "a", 1.0)]).await;
        cache.set_page(&a, 4, "a4").await;
        cache.save_all(&a_b, &[OcrResult::new(1, "ab", 1.0)]).await;
        cache.set_page(&a_b, 1, "ab1").await;

        assert!(cache.clear_document(&a).await);

        assert_eq!(cache.get_all(&a).await, None);
        assert_eq!(cache.get_page(&a, 4).await, None);
        assert!(cache.get_all(&a_b).await.is_some());
        assert_eq!(cache.get_page(&a_b, 1).await.as_deref(), Some("ab1"));
    }
}
