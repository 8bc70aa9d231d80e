use thiserror::Error;

/// Errors surfaced by key-value store backends.
///
/// The caches built on top never hand these to their callers; they log them
/// and fall back to an absent or default value.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },
    #[error("failed to remove {} key(s)", failed.len())]
    PartialRemoval { failed: Vec<String> },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from building a [`crate::StorageConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
}
