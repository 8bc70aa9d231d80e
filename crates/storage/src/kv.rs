//! Asynchronous string-keyed persistent store.
//!
//! Every higher cache is written against [`KeyValueStore`]. Backends make no
//! transactional promise across keys; a failed `set` must leave the previous
//! value of that key in place.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::{StorageError, StorageResult};

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, or `None` when the key is absent.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    async fn list_keys(&self) -> StorageResult<Vec<String>>;

    /// Removes every key starting with `prefix` and returns how many went.
    ///
    /// Keeps going past individual failures; if any key could not be removed
    /// the call ends with [`StorageError::PartialRemoval`] naming them.
    async fn remove_matching_prefix(&self, prefix: &str) -> StorageResult<usize> {
        let keys = self.list_keys().await?;
        remove_all(self, keys.into_iter().filter(|key| key.starts_with(prefix))).await
    }
}

/// Removes each key in turn, collecting failures instead of stopping.
pub(crate) async fn remove_all<S, I>(store: &S, keys: I) -> StorageResult<usize>
where
    S: KeyValueStore + ?Sized,
    I: IntoIterator<Item = String> + Send,
    I::IntoIter: Send,
{
    let mut removed = 0;
    let mut failed = Vec::new();

    for key in keys {
        match store.remove(&key).await {
            Ok(()) => removed += 1,
            Err(err) => {
                warn!(key = %key, error = %err, "failed to remove key");
                failed.push(key);
            }
        }
    }

    if failed.is_empty() {
        Ok(removed)
    } else {
        Err(StorageError::PartialRemoval { failed })
    }
}

/// In-memory store. Contents live as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.data.write().await.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.data.read().await.keys().cloned().collect())
    }

    async fn remove_matching_prefix(&self, prefix: &str) -> StorageResult<usize> {
        let mut data = self.data.write().await;
        let before = data.len();
        data.retain(|key, _| !key.starts_with(prefix));
        Ok(before - data.len())
    }
}
