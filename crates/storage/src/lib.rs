//! SmartPDF local storage
//!
//! Persistent key-value adapter plus the three caches built on it: recent
//! files, OCR results and settings.

pub mod clock;
pub mod config;
pub mod error;
pub mod file_store;
pub mod keys;
pub mod kv;
pub mod ocr;
pub mod recent;
pub mod settings;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::StorageConfig;
pub use error::{ConfigError, StorageError, StorageResult};
pub use file_store::FileStore;
pub use kv::{KeyValueStore, MemoryStore};
pub use ocr::OcrCache;
pub use recent::{RecentFiles, DEFAULT_RECENT_CAPACITY};
pub use settings::SettingsStore;
