//! External collaborators consumed by the engine.
//!
//! The engine owns none of these services. Each trait is the narrow
//! contract the engine relies on; real deployments plug in indexer,
//! verifier and transaction-library clients, while [`crate::stub`]
//! provides dry-run implementations.
//!
//! Every async call made by the engine goes through [`bounded`], so an
//! unresponsive service fails the cycle instead of stalling it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use payout_split::PlanError;
use payout_types::{Address, ConfigSnapshot, PayoutConfig, UnspentOutput};

use crate::secrets::SigningKey;

/// Failure of an external service call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The service could not be reached or returned a transport error.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The service answered but refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The call did not complete within the configured limit.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure of a config store operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The stored version moved on since the writer loaded its snapshot.
    #[error("version conflict: expected {expected}, found {actual}")]
    Conflict {
        /// Version the writer based its edit on.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// The configuration's distribution table is invalid.
    #[error("invalid distribution: {0}")]
    InvalidDistribution(PlanError),

    /// Storage I/O failed.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Stored data could not be decoded.
    #[error("stored config is corrupt: {0}")]
    Corrupt(String),
}

/// The builder refused an input, output or signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BuildRejection(pub String);

/// Payout configuration storage with optimistic concurrency.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the current snapshot.
    async fn load(&self) -> Result<ConfigSnapshot, StoreError>;

    /// Replace the configuration if the stored version equals
    /// `expected_version`. Returns the new version.
    async fn save(&self, config: PayoutConfig, expected_version: u64) -> Result<u64, StoreError>;
}

/// Balance lookups.
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    /// Confirmed balance of `address` in base units.
    async fn balance(&self, address: &Address) -> Result<u64, ServiceError>;
}

/// What a proof says about its holder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedProof {
    /// The payout address the proof was issued for.
    pub payout_address: Address,
}

/// Eligibility proof verification.
#[async_trait]
pub trait ProofVerifier: Send + Sync {
    /// Whether the proof verifies.
    async fn verify(&self, proof: &str) -> Result<bool, ServiceError>;

    /// Decode the proof's claims.
    async fn decode(&self, proof: &str) -> Result<DecodedProof, ServiceError>;
}

/// Address format rules. Pure and synchronous.
pub trait AddressValidator: Send + Sync {
    /// Whether `address` is well formed.
    fn is_well_formed(&self, address: &Address) -> bool;

    /// The canonical spelling of `address`, used for equality checks.
    fn to_canonical(&self, address: &Address) -> Address;
}

/// Unspent output listings.
#[async_trait]
pub trait UtxoSource: Send + Sync {
    /// All unspent outputs held by `address`.
    async fn list_utxos(&self, address: &Address) -> Result<Vec<UnspentOutput>, ServiceError>;

    /// Current chain tip height.
    async fn current_height(&self) -> Result<u32, ServiceError>;
}

/// A single-use transaction builder owned by one cycle.
pub trait TxBuilder: Send {
    /// Spend `utxo`.
    fn add_input(&mut self, utxo: &UnspentOutput) -> Result<(), BuildRejection>;

    /// Pay `amount` to `address`.
    fn add_output(&mut self, address: &Address, amount: u64) -> Result<(), BuildRejection>;

    /// Sign the input spending `utxo`.
    fn sign(&mut self, utxo: &UnspentOutput, key: &SigningKey) -> Result<(), BuildRejection>;

    /// Serialize the signed transaction.
    fn serialize(&self) -> Result<Vec<u8>, BuildRejection>;
}

/// Creates a fresh [`TxBuilder`] per cycle.
pub trait TxBuilderFactory: Send + Sync {
    /// A new, empty builder.
    fn builder(&self) -> Box<dyn TxBuilder>;
}

/// Broadcaster acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BroadcastAck {
    /// Transaction id as reported by the network. May be empty on a
    /// malformed response.
    pub tx_id: String,
}

/// Transaction submission.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Submit serialized transaction bytes.
    async fn submit(&self, tx: &[u8]) -> Result<BroadcastAck, ServiceError>;
}

/// Every collaborator a payout cycle talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Payout configuration source.
    pub config_store: Arc<dyn ConfigStore>,
    /// Funding balance lookups.
    pub balances: Arc<dyn BalanceOracle>,
    /// Proof verification.
    pub proofs: Arc<dyn ProofVerifier>,
    /// Address format rules.
    pub addresses: Arc<dyn AddressValidator>,
    /// Funding UTXO listings.
    pub utxos: Arc<dyn UtxoSource>,
    /// Transaction construction.
    pub builders: Arc<dyn TxBuilderFactory>,
    /// Transaction submission.
    pub broadcaster: Arc<dyn Broadcaster>,
}

/// Run `call` with a time limit.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout(limit)),
    }
}
