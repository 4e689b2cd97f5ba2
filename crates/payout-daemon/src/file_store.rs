//! JSON-file-backed payout config store.
//!
//! The whole snapshot lives in one pretty-printed document:
//!
//! ```json
//! { "version": 3, "config": { "payout_address": "...", ... } }
//! ```
//!
//! A missing file is version 0 with an empty config. Saves go to a
//! temporary sibling first and are renamed over the original, so a crash
//! mid-write leaves the previous version intact. The file is re-read on
//! every load, so operators may edit it by hand between cycles.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use payout_engine::collaborators::{ConfigStore, StoreError};
use payout_engine::store::next_snapshot;
use payout_types::{ConfigSnapshot, PayoutConfig};
use tokio::sync::Mutex;
use tracing::info;

/// Config file name inside the data directory.
pub const CONFIG_STORE_FILE: &str = "payout_config.json";

/// Config store persisted as a JSON document.
pub struct JsonFileConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileConfigStore {
    /// A store backed by `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<ConfigSnapshot, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ConfigSnapshot::default()),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn write(&self, snapshot: &ConfigSnapshot) -> Result<(), StoreError> {
        let json =
            serde_json::to_vec_pretty(snapshot).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }
}

#[async_trait]
impl ConfigStore for JsonFileConfigStore {
    async fn load(&self) -> Result<ConfigSnapshot, StoreError> {
        self.read().await
    }

    async fn save(&self, config: PayoutConfig, expected_version: u64) -> Result<u64, StoreError> {
        let _guard = self.write_lock.lock().await;
        let current = self.read().await?;
        let next = next_snapshot(&current, config, expected_version)?;
        self.write(&next).await?;
        info!(path = %self.path.display(), version = next.version, "payout config saved");
        Ok(next.version)
    }
}
