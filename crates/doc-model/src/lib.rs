//! Data model shared by the caches and the session layer.
//!
//! Everything here is plain data: documents the user has opened, OCR output
//! per page, annotations and the open settings map. Serialized field names
//! are camelCase so the persisted JSON matches what earlier app versions
//! wrote.

pub mod annotation;
pub mod settings;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use annotation::{Annotation, AnnotationId, AnnotationKind};
pub use settings::Settings;

/// Opaque document identifier.
///
/// Fresh identifiers come from [`DocumentId::generate`] (UUID v4). Ids read
/// back from storage are kept verbatim, whatever their shape.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Collision-resistant identifier for a newly picked file.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What the file-picking collaborator hands back for a newly chosen file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickedFile {
    pub name: String,
    pub uri: String,
    pub size: u64,
    pub mime_type: String,
}

/// A PDF the user has opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub id: DocumentId,
    pub name: String,
    /// Opaque locator, resolved by the file-access layer.
    pub uri: String,
    pub size: u64,
    pub mime_type: String,
    /// Epoch milliseconds.
    pub date_added: i64,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_opened: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl DocumentRef {
    /// Builds a reference for a freshly picked file and assigns it a new id.
    pub fn from_picked(file: PickedFile, now_ms: i64) -> Self {
        Self::with_id(DocumentId::generate(), file, now_ms)
    }

    pub fn with_id(id: DocumentId, file: PickedFile, now_ms: i64) -> Self {
        Self {
            id,
            name: file.name,
            uri: file.uri,
            size: file.size,
            mime_type: file.mime_type,
            date_added: now_ms,
            last_opened: None,
            page_count: None,
            thumbnail: None,
        }
    }
}

/// Extracted text for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    pub text: String,
    /// Always within `0.0..=1.0`.
    pub confidence: f32,
    /// 1-based.
    pub page_number: u32,
}

impl OcrResult {
    /// Confidence below this is flagged as unreliable.
    pub const RELIABLE_THRESHOLD: f32 = 0.7;

    pub fn new(page_number: u32, text: impl Into<String>, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        Self { text: text.into(), confidence, page_number }
    }

    pub fn is_reliable(&self) -> bool {
        self.confidence >= Self::RELIABLE_THRESHOLD
    }
}
