//! Dry-run collaborators.
//!
//! These stand in for the indexer, proof verifier and transaction library
//! during development, dry runs and tests. None of them touch a network.
//! The draft builder's encoding is a JSON placeholder, not a ledger
//! transaction; signatures are keyed BLAKE3 tags over the outpoint.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use payout_types::{Address, UnspentOutput};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::collaborators::{
    AddressValidator, BalanceOracle, BroadcastAck, Broadcaster, BuildRejection, DecodedProof,
    ProofVerifier, ServiceError, TxBuilder, TxBuilderFactory, UtxoSource,
};
use crate::secrets::SigningKey;

/// Domain-separation context for draft signatures.
const DRAFT_SIGNATURE_CONTEXT: &str = "payout v1 draft-signature";

/// Default maximum address length accepted by [`CharsetAddressValidator`].
pub const DEFAULT_MAX_ADDRESS_LEN: usize = 128;

/// Format-only address validator.
///
/// Well formed means: non-empty, at most `max_len` characters, ASCII
/// alphanumerics plus `:`, and starting with `prefix` when one is set.
/// Canonical form is trimmed and lowercased.
#[derive(Clone, Debug)]
pub struct CharsetAddressValidator {
    prefix: Option<String>,
    max_len: usize,
}

impl CharsetAddressValidator {
    /// Require every address to start with `prefix` (compared lowercased).
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into().to_ascii_lowercase()),
            max_len: DEFAULT_MAX_ADDRESS_LEN,
        }
    }
}

impl Default for CharsetAddressValidator {
    fn default() -> Self {
        Self {
            prefix: None,
            max_len: DEFAULT_MAX_ADDRESS_LEN,
        }
    }
}

impl AddressValidator for CharsetAddressValidator {
    fn is_well_formed(&self, address: &Address) -> bool {
        let text = address.as_str();
        if text.is_empty() || text.len() > self.max_len {
            return false;
        }
        if !text.bytes().all(|b| b.is_ascii_alphanumeric() || b == b':') {
            return false;
        }
        match &self.prefix {
            Some(prefix) => text.to_ascii_lowercase().starts_with(prefix.as_str()),
            None => true,
        }
    }

    fn to_canonical(&self, address: &Address) -> Address {
        Address::new(address.as_str().trim().to_ascii_lowercase())
    }
}

/// Proof verifier backed by a fixed table of accepted proofs.
#[derive(Clone, Debug, Default)]
pub struct StaticProofVerifier {
    accepted: HashMap<String, Address>,
}

impl StaticProofVerifier {
    /// A verifier that accepts nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `proof`, decoding to `payout_address`.
    pub fn with_proof(mut self, proof: impl Into<String>, payout_address: Address) -> Self {
        self.accepted.insert(proof.into(), payout_address);
        self
    }
}

#[async_trait]
impl ProofVerifier for StaticProofVerifier {
    async fn verify(&self, proof: &str) -> Result<bool, ServiceError> {
        Ok(self.accepted.contains_key(proof))
    }

    async fn decode(&self, proof: &str) -> Result<DecodedProof, ServiceError> {
        self.accepted
            .get(proof)
            .map(|addr| DecodedProof {
                payout_address: addr.clone(),
            })
            .ok_or_else(|| ServiceError::Rejected("unknown proof".to_string()))
    }
}

/// In-memory balances and UTXO sets.
#[derive(Debug, Default)]
pub struct MemoryIndexer {
    balances: RwLock<HashMap<Address, u64>>,
    utxos: RwLock<HashMap<Address, Vec<UnspentOutput>>>,
    height: AtomicU32,
    balance_queries: AtomicUsize,
    utxo_queries: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryIndexer {
    /// An empty indexer at chain height `height`.
    pub fn new(height: u32) -> Self {
        Self {
            height: AtomicU32::new(height),
            ..Self::default()
        }
    }

    /// Set the balance reported for `address`.
    pub async fn set_balance(&self, address: Address, balance: u64) {
        self.balances.write().await.insert(address, balance);
    }

    /// Set the outputs reported for `address`.
    pub async fn set_utxos(&self, address: Address, utxos: Vec<UnspentOutput>) {
        self.utxos.write().await.insert(address, utxos);
    }

    /// Move the chain tip.
    pub fn set_height(&self, height: u32) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Make balance lookups fail as if the indexer were down.
    pub fn fail_balances(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of balance lookups served.
    pub fn balance_queries(&self) -> usize {
        self.balance_queries.load(Ordering::SeqCst)
    }

    /// Number of UTXO listings served.
    pub fn utxo_queries(&self) -> usize {
        self.utxo_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceOracle for MemoryIndexer {
    async fn balance(&self, address: &Address) -> Result<u64, ServiceError> {
        self.balance_queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable("indexer offline".to_string()));
        }
        Ok(self.balances.read().await.get(address).copied().unwrap_or(0))
    }
}

#[async_trait]
impl UtxoSource for MemoryIndexer {
    async fn list_utxos(&self, address: &Address) -> Result<Vec<UnspentOutput>, ServiceError> {
        self.utxo_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .utxos
            .read()
            .await
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    async fn current_height(&self) -> Result<u32, ServiceError> {
        Ok(self.height.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone, Serialize)]
struct DraftInput {
    outpoint: String,
    value: u64,
}

#[derive(Debug, Clone, Serialize)]
struct DraftOutput {
    address: String,
    amount: u64,
}

#[derive(Debug, Clone, Serialize)]
struct DraftSignature {
    outpoint: String,
    tag: String,
}

/// Transaction builder producing a JSON draft.
#[derive(Debug, Default, Serialize)]
pub struct DraftTxBuilder {
    inputs: Vec<DraftInput>,
    outputs: Vec<DraftOutput>,
    signatures: Vec<DraftSignature>,
}

impl DraftTxBuilder {
    fn has_input(&self, outpoint: &str) -> bool {
        self.inputs.iter().any(|i| i.outpoint == outpoint)
    }
}

impl TxBuilder for DraftTxBuilder {
    fn add_input(&mut self, utxo: &UnspentOutput) -> Result<(), BuildRejection> {
        let outpoint = utxo.outpoint();
        if self.has_input(&outpoint) {
            return Err(BuildRejection(format!("input {outpoint} added twice")));
        }
        self.inputs.push(DraftInput {
            outpoint,
            value: utxo.value,
        });
        Ok(())
    }

    fn add_output(&mut self, address: &Address, amount: u64) -> Result<(), BuildRejection> {
        if address.is_blank() {
            return Err(BuildRejection("output address is empty".to_string()));
        }
        self.outputs.push(DraftOutput {
            address: address.as_str().to_string(),
            amount,
        });
        Ok(())
    }

    fn sign(&mut self, utxo: &UnspentOutput, key: &SigningKey) -> Result<(), BuildRejection> {
        let outpoint = utxo.outpoint();
        if !self.has_input(&outpoint) {
            return Err(BuildRejection(format!("cannot sign unknown input {outpoint}")));
        }
        if self.signatures.iter().any(|s| s.outpoint == outpoint) {
            return Err(BuildRejection(format!("input {outpoint} already signed")));
        }
        let signing_key = blake3::derive_key(DRAFT_SIGNATURE_CONTEXT, key.expose().as_bytes());
        let tag = blake3::keyed_hash(&signing_key, outpoint.as_bytes());
        self.signatures.push(DraftSignature {
            outpoint,
            tag: tag.to_hex().to_string(),
        });
        Ok(())
    }

    fn serialize(&self) -> Result<Vec<u8>, BuildRejection> {
        if self.signatures.len() != self.inputs.len() {
            return Err(BuildRejection(format!(
                "{} of {} inputs signed",
                self.signatures.len(),
                self.inputs.len()
            )));
        }
        serde_json::to_vec(self).map_err(|e| BuildRejection(e.to_string()))
    }
}

/// Makes [`DraftTxBuilder`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct DraftTxBuilderFactory;

impl TxBuilderFactory for DraftTxBuilderFactory {
    fn builder(&self) -> Box<dyn TxBuilder> {
        Box::new(DraftTxBuilder::default())
    }
}

/// Broadcaster that records submissions instead of sending them.
///
/// The reported transaction id is the BLAKE3 hash of the payload.
#[derive(Debug, Default)]
pub struct DryRunBroadcaster {
    submitted: Mutex<Vec<Vec<u8>>>,
}

impl DryRunBroadcaster {
    /// A broadcaster with no submissions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of submissions so far.
    pub async fn submitted(&self) -> usize {
        self.submitted.lock().await.len()
    }

    /// The most recent submission.
    pub async fn last(&self) -> Option<Vec<u8>> {
        self.submitted.lock().await.last().cloned()
    }
}

#[async_trait]
impl Broadcaster for DryRunBroadcaster {
    async fn submit(&self, tx: &[u8]) -> Result<BroadcastAck, ServiceError> {
        let tx_id = hex::encode(blake3::hash(tx).as_bytes());
        tracing::info!(tx_id = %tx_id, bytes = tx.len(), "dry run: transaction not sent");
        self.submitted.lock().await.push(tx.to_vec());
        Ok(BroadcastAck { tx_id })
    }
}
