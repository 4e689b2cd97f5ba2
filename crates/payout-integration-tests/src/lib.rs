//! Integration test crate for the payout engine.
//!
//! The library only holds the shared rig; the tests under `tests/`
//! drive whole cycles across the types, selection, planning and engine
//! crates with in-memory collaborators.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p payout-integration-tests
//! ```

use std::sync::Arc;
use std::time::Duration;

use payout_engine::collaborators::{BalanceOracle, Broadcaster, Collaborators, ConfigStore};
use payout_engine::executor::{EngineSettings, PayoutExecutor};
use payout_engine::scheduler::Scheduler;
use payout_engine::secrets::{Secrets, SigningKey};
use payout_engine::store::MemoryConfigStore;
use payout_engine::stub::{
    CharsetAddressValidator, DraftTxBuilderFactory, DryRunBroadcaster, MemoryIndexer,
    StaticProofVerifier,
};
use payout_types::{
    Address, Decimal, PayoutConfig, Percentage, RecipientEntry, RewardDistribution, TxId,
    UnspentOutput,
};

/// Funding address used by every rig.
pub const FUND: &str = "addr1fund";

/// Proof accepted by every rig.
pub const PROOF: &str = "proof-fund";

/// Chain height reported by the rig's indexer.
pub const TIP: u32 = 10_000;

/// A recipient paying `percentage` (decimal text) to `address`.
pub fn recipient(address: &str, percentage: &str) -> RecipientEntry {
    RecipientEntry {
        source_address: Address::new(format!("{address}src")),
        observed_amount: Decimal::default(),
        is_valid: true,
        reward_distribution: RewardDistribution {
            address: Address::new(address),
            percentage: percentage
                .parse::<Percentage>()
                .expect("valid percentage literal"),
        },
    }
}

/// A payout config funded from [`FUND`] with the given recipients.
pub fn payout_config(recipients: Vec<RecipientEntry>) -> PayoutConfig {
    PayoutConfig {
        payout_address: Address::new(FUND),
        proof: PROOF.to_string(),
        recipients,
    }
}

/// A plain, mature output.
pub fn utxo(id: u8, vout: u32, value: u64) -> UnspentOutput {
    UnspentOutput {
        tx_id: TxId([id; 32]),
        vout,
        value,
        block_height: TIP - 500,
        is_coinbase: false,
        token_meta: None,
    }
}

/// Engine wired to in-memory collaborators.
pub struct Rig {
    /// Balances, UTXOs and chain tip.
    pub indexer: Arc<MemoryIndexer>,
    /// Versioned payout config.
    pub store: Arc<MemoryConfigStore>,
    /// Records submitted transactions.
    pub broadcaster: Arc<DryRunBroadcaster>,
    /// The executor under test.
    pub executor: Arc<PayoutExecutor>,
}

/// Builder for [`Rig`].
pub struct RigBuilder {
    settings: EngineSettings,
    config: PayoutConfig,
    balances: Option<Arc<dyn BalanceOracle>>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
}

impl RigBuilder {
    /// Threshold, base unit and per-output fee.
    pub fn new(threshold: u64, base_unit: u64, fee_rate: u64) -> Self {
        let mut settings = EngineSettings::new(threshold, base_unit, fee_rate);
        settings.call_timeout = Duration::from_secs(5);
        settings.explorer_base_url = "https://explorer.test".to_string();
        Self {
            settings,
            config: payout_config(Vec::new()),
            balances: None,
            broadcaster: None,
        }
    }

    /// Seed the config store.
    pub fn config(mut self, config: PayoutConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the balance oracle.
    pub fn balances(mut self, balances: Arc<dyn BalanceOracle>) -> Self {
        self.balances = Some(balances);
        self
    }

    /// Replace the broadcaster.
    pub fn broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Wire everything up.
    pub fn build(self) -> Rig {
        let indexer = Arc::new(MemoryIndexer::new(TIP));
        let store = Arc::new(MemoryConfigStore::with_config(self.config));
        let dry_run = Arc::new(DryRunBroadcaster::new());
        let collaborators = Collaborators {
            config_store: store.clone() as Arc<dyn ConfigStore>,
            balances: self
                .balances
                .unwrap_or_else(|| indexer.clone() as Arc<dyn BalanceOracle>),
            proofs: Arc::new(StaticProofVerifier::new().with_proof(PROOF, Address::new(FUND))),
            addresses: Arc::new(CharsetAddressValidator::with_prefix("addr1")),
            utxos: indexer.clone(),
            builders: Arc::new(DraftTxBuilderFactory),
            broadcaster: self
                .broadcaster
                .unwrap_or_else(|| dry_run.clone() as Arc<dyn Broadcaster>),
        };
        let secrets = Secrets {
            signing_key: Some(SigningKey::new("test-signing-key")),
            funding_address: Some(Address::new(FUND)),
        };
        Rig {
            indexer,
            store,
            broadcaster: dry_run,
            executor: Arc::new(PayoutExecutor::new(self.settings, secrets, collaborators)),
        }
    }
}

impl Rig {
    /// A scheduler over this rig's executor.
    pub fn scheduler(&self, interval: Duration) -> Arc<Scheduler> {
        Arc::new(Scheduler::new(self.executor.clone(), interval))
    }

    /// Set the funding balance.
    pub async fn fund_balance(&self, balance: u64) {
        self.indexer.set_balance(Address::new(FUND), balance).await;
    }

    /// Set the funding UTXOs.
    pub async fn fund_utxos(&self, utxos: Vec<UnspentOutput>) {
        self.indexer.set_utxos(Address::new(FUND), utxos).await;
    }

    /// The last submitted draft, decoded.
    pub async fn last_draft(&self) -> Option<serde_json::Value> {
        let bytes = self.broadcaster.last().await?;
        serde_json::from_slice(&bytes).ok()
    }
}
