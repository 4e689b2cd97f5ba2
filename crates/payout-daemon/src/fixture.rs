//! File-backed indexer and proof verifier for dry runs.
//!
//! Reads a JSON fixture on every call, so the file can be edited while the
//! daemon runs to move balances or the chain tip:
//!
//! ```json
//! {
//!   "height": 1000,
//!   "balances": { "addr1...": 2000000 },
//!   "utxos": { "addr1...": [ { "tx_id": "<64 hex>", "vout": 0, "value": 2000000, "block_height": 900 } ] },
//!   "proofs": { "<proof>": "addr1..." }
//! }
//! ```
//!
//! An unreadable fixture reports the service as unavailable.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use payout_engine::collaborators::{
    BalanceOracle, DecodedProof, ProofVerifier, ServiceError, UtxoSource,
};
use payout_types::{Address, UnspentOutput};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Contents of a fixture file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    /// Chain tip height.
    #[serde(default)]
    pub height: u32,
    /// Confirmed balances by address.
    #[serde(default)]
    pub balances: HashMap<Address, u64>,
    /// Unspent outputs by address.
    #[serde(default)]
    pub utxos: HashMap<Address, Vec<UnspentOutput>>,
    /// Accepted proofs and the payout address each was issued for.
    #[serde(default)]
    pub proofs: HashMap<String, Address>,
}

/// Indexer and verifier answering from a fixture file.
pub struct FixtureIndexer {
    path: PathBuf,
}

impl FixtureIndexer {
    /// Answer from the fixture at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn fixture(&self) -> Result<Fixture, ServiceError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            ServiceError::Unavailable(format!("fixture {}: {e}", self.path.display()))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ServiceError::Unavailable(format!("fixture {} unreadable: {e}", self.path.display()))
        })
    }
}

#[async_trait]
impl BalanceOracle for FixtureIndexer {
    async fn balance(&self, address: &Address) -> Result<u64, ServiceError> {
        let balance = self
            .fixture()
            .await?
            .balances
            .get(address)
            .copied()
            .unwrap_or(0);
        debug!(address = %address, balance, "fixture balance");
        Ok(balance)
    }
}

#[async_trait]
impl UtxoSource for FixtureIndexer {
    async fn list_utxos(&self, address: &Address) -> Result<Vec<UnspentOutput>, ServiceError> {
        let mut fixture = self.fixture().await?;
        Ok(fixture.utxos.remove(address).unwrap_or_default())
    }

    async fn current_height(&self) -> Result<u32, ServiceError> {
        Ok(self.fixture().await?.height)
    }
}

#[async_trait]
impl ProofVerifier for FixtureIndexer {
    async fn verify(&self, proof: &str) -> Result<bool, ServiceError> {
        Ok(self.fixture().await?.proofs.contains_key(proof))
    }

    async fn decode(&self, proof: &str) -> Result<DecodedProof, ServiceError> {
        self.fixture()
            .await?
            .proofs
            .remove(proof)
            .map(|payout_address| DecodedProof { payout_address })
            .ok_or_else(|| ServiceError::Rejected("proof not in fixture".to_string()))
    }
}
