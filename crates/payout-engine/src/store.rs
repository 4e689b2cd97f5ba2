//! In-memory versioned config store.
//!
//! Single owner of the payout configuration inside one process. Writers
//! load a snapshot, edit it and save it back with the version they
//! loaded; a save against a stale version is refused rather than merged.

use async_trait::async_trait;
use payout_split::planner::validate_distribution;
use payout_types::{ConfigSnapshot, PayoutConfig};
use tokio::sync::RwLock;

use crate::collaborators::{ConfigStore, StoreError};

/// Check a save request against the current snapshot and build the next one.
///
/// Shared by every [`ConfigStore`] implementation so that all of them
/// enforce the same version and distribution rules.
pub fn next_snapshot(
    current: &ConfigSnapshot,
    config: PayoutConfig,
    expected_version: u64,
) -> Result<ConfigSnapshot, StoreError> {
    if current.version != expected_version {
        return Err(StoreError::Conflict {
            expected: expected_version,
            actual: current.version,
        });
    }
    validate_distribution(&config).map_err(StoreError::InvalidDistribution)?;
    Ok(ConfigSnapshot {
        version: current.version + 1,
        config,
    })
}

/// Config store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    snapshot: RwLock<ConfigSnapshot>,
}

impl MemoryConfigStore {
    /// An empty store at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with `config` at version 1.
    ///
    /// The seed is not validated; the planner re-checks it every cycle.
    pub fn with_config(config: PayoutConfig) -> Self {
        Self {
            snapshot: RwLock::new(ConfigSnapshot { version: 1, config }),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<ConfigSnapshot, StoreError> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn save(&self, config: PayoutConfig, expected_version: u64) -> Result<u64, StoreError> {
        let mut guard = self.snapshot.write().await;
        let next = next_snapshot(&guard, config, expected_version)?;
        let version = next.version;
        *guard = next;
        tracing::info!(version, "payout config saved");
        Ok(version)
    }
}
