//! OCR cache-or-compute
//!
//! Text for a page comes from the first source that has it: the session,
//! the document's OCR cache, and finally the OCR engine. Engine output is
//! cached so the engine runs at most once per page.

use std::ops::RangeInclusive;
use std::sync::Arc;

use async_trait::async_trait;
use smartpdf_model::{DocumentRef, OcrResult};
use thiserror::Error;
use tracing::{debug, info};

use crate::session::SessionContext;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OcrError {
    #[error("no document is open")]
    NoDocument,

    #[error("invalid page number {0}; pages start at 1")]
    InvalidPage(u32),

    #[error("language data not found: {0}")]
    LanguageNotFound(String),

    #[error("OCR processing failed: {0}")]
    ProcessingFailed(String),
}

/// Text recognizer for a single page.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognizes `page` (1-based) of `document` using `language`
    /// (a Tesseract-style code such as `eng`).
    async fn recognize(
        &self,
        document: &DocumentRef,
        page: u32,
        language: &str,
    ) -> Result<OcrResult, OcrError>;
}

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrSource {
    Session,
    Cache,
    Engine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub result: OcrResult,
    pub source: OcrSource,
}

#[derive(Clone)]
pub struct OcrRunner {
    session: SessionContext,
    engine: Arc<dyn OcrEngine>,
}

impl OcrRunner {
    pub fn new(session: SessionContext, engine: Arc<dyn OcrEngine>) -> Self {
        Self { session, engine }
    }

    /// Text for `page` of the current document.
    ///
    /// A result computed by the engine is merged into the cache even if the
    /// user has moved to another document meanwhile; it is only added to
    /// the session if the same document is still open.
    ///
    /// # Errors
    /// Returns an error if no document is open, `page` is 0, or the engine
    /// fails. Engine failures leave the caches untouched.
    pub async fn page_text(&self, page: u32) -> Result<PageText, OcrError> {
        let document = self.session.current_document().await.ok_or(OcrError::NoDocument)?;
        if page == 0 {
            return Err(OcrError::InvalidPage(page));
        }

        if let Some(result) = self.session.ocr_result(page).await {
            return Ok(PageText { result, source: OcrSource::Session });
        }

        if let Some(result) = self.session.ocr_cache().get_result(&document.id, page).await {
            debug!(id = %document.id, page, "ocr cache hit");
            self.session.record_ocr_for(&document.id, page, result.clone()).await;
            return Ok(PageText { result, source: OcrSource::Cache });
        }

        let language = self.session.settings().await.ocr_language().to_owned();
        let mut result = self.engine.recognize(&document, page, &language).await?;
        result.page_number = page;
        info!(id = %document.id, page, confidence = result.confidence, "page recognized");

        self.session.ocr_cache().merge_result(&document.id, result.clone()).await;
        self.session.mirror_ocr(&document.id, std::slice::from_ref(&result)).await;
        self.session.record_ocr_for(&document.id, page, result.clone()).await;

        Ok(PageText { result, source: OcrSource::Engine })
    }

    /// Text for every page in `pages`, in order.
    ///
    /// # Errors
    /// Stops at the first failing page. Pages finished before it stay
    /// cached.
    pub async fn document_text(&self, pages: RangeInclusive<u32>) -> Result<Vec<PageText>, OcrError> {
        let mut texts = Vec::new();
        for page in pages {
            texts.push(self.page_text(page).await?);
        }
        Ok(texts)
    }
}
