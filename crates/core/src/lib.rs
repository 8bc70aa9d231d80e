//! SmartPDF session core
//!
//! The shared session context screens talk to, annotation undo/redo,
//! best-effort remote mirroring of cache writes and the OCR
//! cache-or-compute runner.

pub mod history;
pub mod mirror;
pub mod ocr;
pub mod session;

pub use history::{AnnotationHistory, DEFAULT_HISTORY_DEPTH};
pub use mirror::{
    Filter, IdentityProvider, MirrorError, RemoteMirror, Replicator, Row, StaticIdentity,
    DOCUMENTS_TABLE, OCR_RESULTS_TABLE,
};
pub use ocr::{OcrEngine, OcrError, OcrRunner, OcrSource, PageText};
pub use session::SessionContext;
