//! Best-effort replication of local cache writes to a remote store.
//!
//! The local caches are always written first and are the source of truth on
//! this device. Remote writes run as detached tokio tasks after the local
//! write has completed; a failed remote write is logged and never undone
//! locally. Until the next successful remote write for the same row the two
//! sides may disagree.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use smartpdf_model::{DocumentId, DocumentRef, OcrResult};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Remote table holding one row per (user, document)
pub const DOCUMENTS_TABLE: &str = "documents";
/// Remote table holding one row per (user, document, page)
pub const OCR_RESULTS_TABLE: &str = "ocr_results";

pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("remote request failed: {0}")]
    Request(String),

    #[error("remote rejected the record: {0}")]
    Rejected(String),

    #[error("record serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Column equality filter, all conditions must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|(column, value)| row.get(column) == Some(value))
    }
}

/// Remote database the caches are mirrored to.
#[async_trait]
pub trait RemoteMirror: Send + Sync {
    async fn insert(&self, table: &str, record: Row) -> Result<(), MirrorError>;

    /// Applies `fields` to every matching row; returns the number updated.
    async fn update(&self, table: &str, filter: &Filter, fields: Row) -> Result<u64, MirrorError>;

    /// Deletes every matching row; returns the number deleted.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, MirrorError>;

    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, MirrorError>;
}

/// Yields the signed-in user, if any.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// Identity provider for a fixed user, or nobody.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<String>);

impl StaticIdentity {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self(Some(user_id.into()))
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Serialize)]
struct DocumentRecord<'a> {
    user_id: &'a str,
    document_id: &'a str,
    name: &'a str,
    uri: &'a str,
    size: u64,
    mime_type: &'a str,
    page_count: Option<u32>,
    last_opened: Option<i64>,
}

#[derive(Serialize)]
struct OcrRecord<'a> {
    user_id: &'a str,
    document_id: &'a str,
    page_number: u32,
    text: &'a str,
    confidence: f32,
}

fn to_row(record: &impl Serialize) -> Result<Row, MirrorError> {
    match serde_json::to_value(record)? {
        Value::Object(row) => Ok(row),
        other => Err(MirrorError::Rejected(format!("expected an object, got {other}"))),
    }
}

/// Update the row matching `filter`, or insert `row` when there is none.
async fn upsert(
    mirror: &dyn RemoteMirror,
    table: &str,
    filter: &Filter,
    row: Row,
) -> Result<(), MirrorError> {
    if mirror.select(table, filter).await?.is_empty() {
        mirror.insert(table, row).await
    } else {
        mirror.update(table, filter, row).await.map(|_| ())
    }
}

/// Fire-and-forget writer from local cache events to a [`RemoteMirror`].
///
/// Each method returns the spawned task's handle, or `None` when nothing was
/// attempted: no user is signed in, or there is no tokio runtime to run the
/// write on. Callers may drop the handle.
///
/// Writes from one replicator (and its clones) run one at a time in the
/// order they queue on the write gate, so the select-then-insert upsert never
/// races itself into duplicate rows.
#[derive(Clone)]
pub struct Replicator {
    mirror: Arc<dyn RemoteMirror>,
    identity: Arc<dyn IdentityProvider>,
    write_gate: Arc<Mutex<()>>,
}

impl Replicator {
    pub fn new(mirror: Arc<dyn RemoteMirror>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { mirror, identity, write_gate: Arc::new(Mutex::new(())) }
    }

    /// Upserts the `documents` row for `doc`.
    pub fn document_opened(&self, doc: &DocumentRef) -> Option<JoinHandle<()>> {
        let user_id = self.identity.current_user_id()?;
        let record = DocumentRecord {
            user_id: &user_id,
            document_id: doc.id.as_str(),
            name: &doc.name,
            uri: &doc.uri,
            size: doc.size,
            mime_type: &doc.mime_type,
            page_count: doc.page_count,
            last_opened: doc.last_opened,
        };
        let row = to_row(&record);
        let filter = Filter::new().eq("user_id", user_id.as_str()).eq("document_id", doc.id.as_str());
        let mirror = Arc::clone(&self.mirror);

        self.spawn("document_opened", async move {
            upsert(mirror.as_ref(), DOCUMENTS_TABLE, &filter, row?).await
        })
    }

    /// Deletes the `documents` row for `id`.
    pub fn document_removed(&self, id: &DocumentId) -> Option<JoinHandle<()>> {
        let user_id = self.identity.current_user_id()?;
        let filter = Filter::new().eq("user_id", user_id).eq("document_id", id.as_str());
        let mirror = Arc::clone(&self.mirror);

        self.spawn("document_removed", async move {
            let deleted = mirror.delete(DOCUMENTS_TABLE, &filter).await?;
            debug!(deleted, "remote document rows deleted");
            Ok::<(), MirrorError>(())
        })
    }

    /// Upserts one `ocr_results` row per page.
    pub fn ocr_saved(&self, id: &DocumentId, results: &[OcrResult]) -> Option<JoinHandle<()>> {
        let user_id = self.identity.current_user_id()?;
        if results.is_empty() {
            return None;
        }

        let rows: Result<Vec<(Filter, Row)>, MirrorError> = results
            .iter()
            .map(|result| {
                let record = OcrRecord {
                    user_id: &user_id,
                    document_id: id.as_str(),
                    page_number: result.page_number,
                    text: &result.text,
                    confidence: result.confidence,
                };
                let filter = Filter::new()
                    .eq("user_id", user_id.as_str())
                    .eq("document_id", id.as_str())
                    .eq("page_number", result.page_number);
                Ok((filter, to_row(&record)?))
            })
            .collect();
        let mirror = Arc::clone(&self.mirror);

        self.spawn("ocr_saved", async move {
            for (filter, row) in rows? {
                upsert(mirror.as_ref(), OCR_RESULTS_TABLE, &filter, row).await?;
            }
            Ok::<(), MirrorError>(())
        })
    }

    fn spawn<F>(&self, operation: &'static str, write: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = Result<(), MirrorError>> + Send + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(operation, error = %err, "no async runtime; remote mirror write skipped");
                return None;
            }
        };

        let gate = Arc::clone(&self.write_gate);
        Some(runtime.spawn(async move {
            let _gate = gate.lock().await;
            match write.await {
                Ok(()) => debug!(operation, "remote mirror write completed"),
                Err(err) => {
                    warn!(operation, error = %err, "remote mirror write failed; local cache kept")
                }
            }
        }))
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use smartpdf_model::PickedFile;

    use super::testing::RecordingMirror;
    use super::*;

    fn document(id: &str) -> DocumentRef {
        let mut doc = DocumentRef::with_id(
            DocumentId::new(id),
            PickedFile {
                name: "report.pdf".to_owned(),
                uri: "file:///report.pdf".to_owned(),
                size: 2048,
                mime_type: "application/pdf".to_owned(),
            },
            100,
        );
        doc.last_opened = Some(200);
        doc
    }

    fn replicator(identity: StaticIdentity) -> (Replicator, Arc<RecordingMirror>) {
        let mirror = Arc::new(RecordingMirror::default());
        (Replicator::new(mirror.clone(), Arc::new(identity)), mirror)
    }

    #[test]
    fn filter_matches_all_conditions() {
        let filter = Filter::new().eq("user_id", "u1").eq("page_number", 3);
        let mut row = Row::new();
        row.insert("user_id".into(), "u1".into());
        row.insert("page_number".into(), 3.into());
        assert!(filter.matches(&row));

        row.insert("page_number".into(), 4.into());
        assert!(!filter.matches(&row));
    }

    #[tokio::test]
    async fn signed_out_skips_remote() {
        let (replicator, mirror) = replicator(StaticIdentity::signed_out());

        assert!(replicator.document_opened(&document("1")).is_none());
        assert!(replicator.document_removed(&DocumentId::new("1")).is_none());
        assert!(mirror.rows(DOCUMENTS_TABLE).await.is_empty());
    }

    #[tokio::test]
    async fn document_opened_upserts_one_row() {
        let (replicator, mirror) = replicator(StaticIdentity::signed_in("user-1"));
        let mut doc = document("1");

        replicator.document_opened(&doc).expect("spawned").await.expect("task");
        doc.last_opened = Some(900);
        replicator.document_opened(&doc).expect("spawned").await.expect("task");

        let rows = mirror.rows(DOCUMENTS_TABLE).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["user_id"], "user-1");
        assert_eq!(rows[0]["document_id"], "1");
        assert_eq!(rows[0]["last_opened"], 900);
    }

    #[tokio::test]
    async fn document_removed_deletes_row() {
        let (replicator, mirror) = replicator(StaticIdentity::signed_in("user-1"));

        replicator.document_opened(&document("1")).expect("spawned").await.expect("task");
        replicator.document_opened(&document("2")).expect("spawned").await.expect("task");
        replicator.document_removed(&DocumentId::new("1")).expect("spawned").await.expect("task");

        let rows = mirror.rows(DOCUMENTS_TABLE).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["document_id"], "2");
    }

    #[tokio::test]
    async fn ocr_saved_writes_row_per_page() {
        let (replicator, mirror) = replicator(StaticIdentity::signed_in("user-1"));
        let id = DocumentId::new("doc");
        let results = [OcrResult::new(1, "one", 0.9), OcrResult::new(2, "two", 0.8)];

        replicator.ocr_saved(&id, &results).expect("spawned").await.expect("task");
        replicator
            .ocr_saved(&id, &[OcrResult::new(2, "two again", 0.95)])
            .expect("spawned")
            .await
            .expect("task");

        let rows = mirror.rows(OCR_RESULTS_TABLE).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["text"], "two again");
    }

    #[tokio::test]
    async fn remote_failure_is_swallowed() {
        let (replicator, mirror) = replicator(StaticIdentity::signed_in("user-1"));
        mirror.offline.store(true, Ordering::SeqCst);

        let handle = replicator.document_opened(&document("1")).expect("spawned");
        assert!(handle.await.is_ok());

        mirror.offline.store(false, Ordering::SeqCst);
        assert!(mirror.rows(DOCUMENTS_TABLE).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn back_to_back_opens_leave_one_row() {
        let (replicator, mirror) = replicator(StaticIdentity::signed_in("user-1"));
        mirror.slow.store(true, Ordering::SeqCst);
        let mut doc = document("1");

        let first = replicator.document_opened(&doc).expect("spawned");
        doc.last_opened = Some(900);
        let second = replicator.document_opened(&doc).expect("spawned");
        first.await.expect("task");
        second.await.expect("task");

        let rows = mirror.rows(DOCUMENTS_TABLE).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["document_id"], "1");
    }

    #[test]
    fn without_runtime_nothing_is_spawned() {
        let (replicator, _mirror) = replicator(StaticIdentity::signed_in("user-1"));

        assert!(replicator.document_opened(&document("1")).is_none());
        assert!(replicator.document_removed(&DocumentId::new("1")).is_none());
        let results = [OcrResult::new(1, "one", 0.9)];
        assert!(replicator.ocr_saved(&DocumentId::new("1"), &results).is_none());
    }
}
