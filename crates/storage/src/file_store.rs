//! Directory-backed key-value store: one file per key.
//!
//! Keys are percent-encoded into file names so any string is a valid key and
//! `list_keys` can hand back the original. Values are written to a temp file
//! and renamed into place, so a reader never sees a half-written value.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;

use crate::error::{StorageError, StorageResult};
use crate::kv::KeyValueStore;

const VALUE_EXTENSION: &str = ".kv";
const TEMP_EXTENSION: &str = ".tmp";
/// Longest encoded key accepted. Leaves room for the temp-file suffix under
/// the usual 255-byte file name limit.
const MAX_ENCODED_KEY_LEN: usize = 200;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn value_path(&self, key: &str) -> StorageResult<PathBuf> {
        Ok(self.root.join(format!("{}{VALUE_EXTENSION}", file_stem(key)?)))
    }

    fn temp_path(&self, key: &str) -> StorageResult<PathBuf> {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let stem = file_stem(key)?;
        Ok(self.root.join(format!("{stem}.{}.{n}{TEMP_EXTENSION}", std::process::id())))
    }
}

fn file_stem(key: &str) -> StorageResult<String> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey { key: key.to_owned(), reason: "empty key" });
    }
    let encoded = encode_key(key);
    if encoded.len() > MAX_ENCODED_KEY_LEN {
        return Err(StorageError::InvalidKey {
            key: key.to_owned(),
            reason: "key too long for a file name",
        });
    }
    Ok(encoded)
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.value_path(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.value_path(key)?;
        fs::create_dir_all(&self.root).await?;

        let temp = self.temp_path(key)?;
        if let Err(err) = fs::write(&temp, value).await {
            let _ = fs::remove_file(&temp).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.value_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_keys(&self) -> StorageResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(encoded) = name.strip_suffix(VALUE_EXTENSION) else {
                continue;
            };
            if let Some(key) = decode_key(encoded) {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Keeps ASCII alphanumerics, `-` and `_`; everything else becomes `%XX`.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded).ok()
}
