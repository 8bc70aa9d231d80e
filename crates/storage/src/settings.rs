//! Settings persisted as one JSON object under the `settings` key.

use std::sync::Arc;

use serde_json::Value;
use smartpdf_model::Settings;
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::StorageResult;
use crate::keys;
use crate::kv::KeyValueStore;

#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    write_gate: Arc<Mutex<()>>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, write_gate: Arc::new(Mutex::new(())) }
    }

    /// Current settings: stored values over the defaults.
    ///
    /// Never fails; an absent, corrupt or unreadable entry yields the
    /// defaults.
    pub async fn get_all(&self) -> Settings {
        match self.read().await {
            Ok(settings) => settings,
            Err(err) => {
                warn!(error = %err, "could not read settings; using defaults");
                Settings::default()
            }
        }
    }

    /// Sets one key and writes the whole map back.
    ///
    /// Keys the caller did not touch, known or not, are kept.
    pub async fn set(&self, key: &str, value: Value) -> bool {
        let _gate = self.write_gate.lock().await;

        let mut settings = match self.read().await {
            Ok(settings) => settings,
            Err(err) => {
                warn!(key, error = %err, "could not read settings; not updating");
                return false;
            }
        };
        settings.set(key, value);

        self.write(&settings).await
    }

    /// Overwrites the stored map with `settings` as given.
    pub async fn replace(&self, settings: &Settings) -> bool {
        let _gate = self.write_gate.lock().await;
        self.write(settings).await
    }

    async fn read(&self) -> StorageResult<Settings> {
        let Some(raw) = self.store.get(keys::SETTINGS).await? else {
            return Ok(Settings::default());
        };

        match serde_json::from_str::<Settings>(&raw) {
            Ok(stored) => Ok(Settings::with_overrides(stored)),
            Err(err) => {
                warn!(error = %err, "settings entry is corrupt; using defaults");
                Ok(Settings::default())
            }
        }
    }

    async fn write(&self, settings: &Settings) -> bool {
        let json = match serde_json::to_string(settings) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "could not serialize settings");
                return false;
            }
        };

        match self.store.set(keys::SETTINGS, &json).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "could not persist settings");
                false
            }
        }
    }
}
