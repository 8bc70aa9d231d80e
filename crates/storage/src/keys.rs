//! Key namespace shared by the caches.
//!
//! | key | value |
//! |---|---|
//! | `recent_files` | JSON array of documents |
//! | `ocr_cache_<documentId>` | JSON array of page results |
//! | `ocr_cache_<documentId>_<page>` | plain text |
//! | `settings` | JSON object |

use smartpdf_model::DocumentId;

pub const RECENT_FILES: &str = "recent_files";
pub const SETTINGS: &str = "settings";
pub const OCR_CACHE_PREFIX: &str = "ocr_cache_";

pub fn ocr_document(id: &DocumentId) -> String {
    format!("{OCR_CACHE_PREFIX}{id}")
}

pub fn ocr_page(id: &DocumentId, page: u32) -> String {
    format!("{OCR_CACHE_PREFIX}{id}_{page}")
}

/// True when `key` is a per-page entry of `id`.
///
/// Checks for a numeric page suffix so that document `a` does not claim the
/// bulk entry of a document called `a_b`.
pub fn is_ocr_page_of(key: &str, id: &DocumentId) -> bool {
    key.strip_prefix(OCR_CACHE_PREFIX)
        .and_then(|rest| rest.strip_prefix(id.as_str()))
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|page| !page.is_empty() && page.bytes().all(|b| b.is_ascii_digit()))
}
