//! Payout cycle state machine.
//!
//! One call to [`PayoutExecutor::run_cycle`] walks the states below in
//! order. Each state either hands over to the next one, ends the cycle
//! early with a non-error outcome, or fails. A failure is reported
//! together with the state it happened in; nothing is retried within the
//! cycle.
//!
//! ```text
//! Polling              balance <= threshold        -> BelowThreshold
//! CheckingEligibility  !overall                    -> Ineligible
//! Planning             plan(config, base_unit)
//! Selecting            target = planned + outputs * fee_rate
//! Building             inputs, payouts, one change output, sign
//! Broadcasting         submit                      -> Paid
//! ```

use std::fmt;
use std::time::Duration;

use payout_select::greedy::{self, SelectionPolicy};
use payout_split::planner;
use payout_types::{
    Address, EligibilitySnapshot, PayoutConfig, PayoutOutput, PayoutReceipt, UnspentOutput,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collaborators::{bounded, BuildRejection, Collaborators, ServiceError};
use crate::eligibility::EligibilityChecker;
use crate::secrets::{Secrets, SigningKey};
use crate::{EngineError, Result};

/// Default per-call timeout for collaborator calls.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Numeric knobs of a payout cycle.
///
/// The threshold and the base unit are configured independently. They are
/// not assumed to share a scale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// A payout triggers only when the balance is strictly above this.
    pub balance_threshold: u64,
    /// Amount split across recipients each payout, in base units.
    pub base_unit: u64,
    /// Flat fee charged per transaction output, in base units.
    pub per_output_fee_rate: u64,
    /// Spendability rules for coin selection.
    pub selection: SelectionPolicy,
    /// Limit for each collaborator call.
    pub call_timeout: Duration,
    /// Block explorer base URL used for receipt links.
    pub explorer_base_url: String,
}

impl EngineSettings {
    /// Settings with the given amounts and defaults for everything else.
    pub fn new(balance_threshold: u64, base_unit: u64, per_output_fee_rate: u64) -> Self {
        Self {
            balance_threshold,
            base_unit,
            per_output_fee_rate,
            selection: SelectionPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            explorer_base_url: String::new(),
        }
    }

    /// Explorer link for `tx_id`.
    pub fn explorer_link(&self, tx_id: &str) -> String {
        format!("{}/tx/{}", self.explorer_base_url.trim_end_matches('/'), tx_id)
    }
}

/// States of a payout cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    /// Waiting for the next tick.
    Idle,
    /// Loading config and fetching the funding balance.
    Polling,
    /// Evaluating eligibility conditions.
    CheckingEligibility,
    /// Computing recipient outputs.
    Planning,
    /// Choosing inputs.
    Selecting,
    /// Constructing and signing the transaction.
    Building,
    /// Submitting the transaction.
    Broadcasting,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::Polling => "polling",
            CycleState::CheckingEligibility => "checking_eligibility",
            CycleState::Planning => "planning",
            CycleState::Selecting => "selecting",
            CycleState::Building => "building",
            CycleState::Broadcasting => "broadcasting",
        };
        f.write_str(name)
    }
}

/// How a cycle that did not fail ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Balance was not above the threshold.
    BelowThreshold {
        /// Observed funding balance.
        balance: u64,
        /// Configured threshold.
        threshold: u64,
    },
    /// At least one eligibility condition failed.
    Ineligible(EligibilitySnapshot),
    /// The payout transaction was broadcast.
    Paid(PayoutReceipt),
}

/// A failed cycle, with where it failed.
#[derive(Debug, thiserror::Error)]
#[error("payout cycle {cycle_id} failed while {state}: {kind}")]
pub struct CycleError {
    /// Identifier of the cycle.
    pub cycle_id: u64,
    /// State the cycle was in when it failed.
    pub state: CycleState,
    /// What went wrong.
    pub kind: EngineError,
}

/// Transaction shape derived from the plan before selection.
struct Draft {
    /// Non-zero payout outputs, in plan order.
    outputs: Vec<PayoutOutput>,
    fee: u64,
    target: u64,
}

/// Runs payout cycles against a fixed set of collaborators.
pub struct PayoutExecutor {
    settings: EngineSettings,
    secrets: Secrets,
    collaborators: Collaborators,
    checker: EligibilityChecker,
}

impl PayoutExecutor {
    /// Create an executor.
    pub fn new(settings: EngineSettings, secrets: Secrets, collaborators: Collaborators) -> Self {
        let checker = EligibilityChecker::new(
            collaborators.proofs.clone(),
            collaborators.addresses.clone(),
            settings.call_timeout,
        );
        Self {
            settings,
            secrets,
            collaborators,
            checker,
        }
    }

    /// The engine settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run one payout cycle to a terminal state.
    ///
    /// # Errors
    ///
    /// A [`CycleError`] carrying the state reached and the [`EngineError`].
    pub async fn run_cycle(&self, cycle_id: u64) -> std::result::Result<CycleOutcome, CycleError> {
        let mut state = CycleState::Idle;
        match self.drive(cycle_id, &mut state).await {
            Ok(outcome) => Ok(outcome),
            Err(kind) => {
                warn!(
                    cycle_id,
                    state = %state,
                    error_kind = kind.kind(),
                    error = %kind,
                    "payout cycle failed"
                );
                Err(CycleError {
                    cycle_id,
                    state,
                    kind,
                })
            }
        }
    }

    async fn drive(&self, cycle_id: u64, state: &mut CycleState) -> Result<CycleOutcome> {
        *state = CycleState::Polling;
        let limit = self.settings.call_timeout;
        let snapshot = tokio::time::timeout(limit, self.collaborators.config_store.load())
            .await
            .map_err(|_| EngineError::external("config_store", ServiceError::Timeout(limit)))??;
        let config = snapshot.config;
        if config.payout_address.is_blank() {
            return Err(EngineError::Config(
                "payout config has no payout address".to_string(),
            ));
        }

        // Poll the wallet that will be spent from. Without a funding address
        // the cycle ends ineligible anyway, so fall back to the config's.
        let polled = self
            .secrets
            .funding_address()
            .unwrap_or(&config.payout_address);
        let balance = self
            .call("balance_oracle", self.collaborators.balances.balance(polled))
            .await?;
        let threshold = self.settings.balance_threshold;
        if balance <= threshold {
            debug!(cycle_id, balance, threshold, "balance not above threshold");
            return Ok(CycleOutcome::BelowThreshold { balance, threshold });
        }
        info!(
            cycle_id,
            config_version = snapshot.version,
            balance,
            threshold,
            "balance above threshold"
        );

        *state = CycleState::CheckingEligibility;
        let eligibility = self.checker.check(&config, &self.secrets).await;
        if !eligibility.overall {
            info!(
                cycle_id,
                failed = ?eligibility.failed(),
                conditions = ?eligibility.conditions,
                "payout not eligible"
            );
            return Ok(CycleOutcome::Ineligible(eligibility));
        }

        let (funding, key) = match (self.secrets.funding_address(), self.secrets.signing_key()) {
            (Some(funding), Some(key)) => (funding, key),
            _ => {
                return Err(EngineError::Config(
                    "funding address or signing key missing".to_string(),
                ))
            }
        };

        *state = CycleState::Planning;
        let draft = self.draft(&config)?;

        *state = CycleState::Selecting;
        let candidates = self
            .call("utxo_source", self.collaborators.utxos.list_utxos(funding))
            .await?;
        let height = self
            .call("utxo_source", self.collaborators.utxos.current_height())
            .await?;
        let selection =
            greedy::select(&candidates, draft.target, height, &self.settings.selection)?;
        let change = selection.total - draft.target;
        info!(
            cycle_id,
            needed = draft.target,
            fee = draft.fee,
            inputs = selection.chosen.len(),
            selected = selection.total,
            change,
            "inputs selected"
        );

        *state = CycleState::Building;
        let bytes = self.build(&selection.chosen, &draft.outputs, funding, change, key)?;

        *state = CycleState::Broadcasting;
        let submitted = bounded(
            self.settings.call_timeout,
            self.collaborators.broadcaster.submit(&bytes),
        )
        .await;
        let ack = match submitted {
            Ok(ack) => ack,
            Err(ServiceError::Rejected(reason)) => return Err(EngineError::Broadcast(reason)),
            Err(e) => return Err(EngineError::external("broadcaster", e)),
        };
        let tx_id = ack.tx_id.trim().to_string();
        if tx_id.is_empty() {
            return Err(EngineError::Broadcast(
                "broadcaster returned an empty transaction id".to_string(),
            ));
        }

        let receipt = PayoutReceipt {
            explorer_link: self.settings.explorer_link(&tx_id),
            tx_id,
            fee: draft.fee,
            total_selected: selection.total,
            change,
            input_count: selection.chosen.len(),
            outputs: draft.outputs,
        };
        info!(
            cycle_id,
            tx_id = %receipt.tx_id,
            explorer_link = %receipt.explorer_link,
            outputs = receipt.outputs.len(),
            "payout broadcast"
        );
        Ok(CycleOutcome::Paid(receipt))
    }

    /// Plan the payout and derive the fee and selection target.
    fn draft(&self, config: &PayoutConfig) -> Result<Draft> {
        let planned = planner::plan(config, self.settings.base_unit)?;
        let outputs: Vec<PayoutOutput> = planned.into_iter().filter(|o| o.amount > 0).collect();

        // Payout outputs plus the change output.
        let output_count = outputs.len() as u64 + 1;
        let fee = output_count
            .checked_mul(self.settings.per_output_fee_rate)
            .ok_or(EngineError::Overflow("fee"))?;
        let target = outputs
            .iter()
            .try_fold(fee, |acc, o| acc.checked_add(o.amount))
            .ok_or(EngineError::Overflow("selection target"))?;

        Ok(Draft {
            outputs,
            fee,
            target,
        })
    }

    fn build(
        &self,
        inputs: &[UnspentOutput],
        outputs: &[PayoutOutput],
        funding: &Address,
        change: u64,
        key: &SigningKey,
    ) -> Result<Vec<u8>> {
        let mut builder = self.collaborators.builders.builder();
        let rejected = |e: BuildRejection| EngineError::Build(e.0);

        for utxo in inputs {
            builder.add_input(utxo).map_err(rejected)?;
        }
        for output in outputs {
            builder
                .add_output(&output.address, output.amount)
                .map_err(rejected)?;
        }
        builder.add_output(funding, change).map_err(rejected)?;
        for utxo in inputs {
            builder.sign(utxo, key).map_err(rejected)?;
        }
        builder.serialize().map_err(rejected)
    }

    async fn call<T, F>(&self, service: &'static str, call: F) -> Result<T>
    where
        F: std::future::Future<Output = std::result::Result<T, ServiceError>>,
    {
        bounded(self.settings.call_timeout, call)
            .await
            .map_err(|e| EngineError::external(service, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{
        CharsetAddressValidator, DraftTxBuilderFactory, DryRunBroadcaster, MemoryIndexer,
        StaticProofVerifier,
    };
    use crate::store::MemoryConfigStore;
    use async_trait::async_trait;
    use payout_types::{Decimal, Percentage, RecipientEntry, RewardDistribution, TxId};
    use std::sync::Arc;

    use crate::collaborators::{
        BroadcastAck, BuildRejection, Broadcaster, TxBuilder, TxBuilderFactory,
    };

    const FUND: &str = "fund1";

    fn recipient(addr: &str, ppb: u64) -> RecipientEntry {
        RecipientEntry {
            source_address: Address::new(format!("src{addr}")),
            observed_amount: Decimal::default(),
            is_valid: true,
            reward_distribution: RewardDistribution {
                address: Address::new(addr),
                percentage: Percentage::from_ppb(ppb),
            },
        }
    }

    fn config() -> PayoutConfig {
        PayoutConfig {
            payout_address: Address::new(FUND),
            proof: "proof".to_string(),
            recipients: vec![
                recipient("alice", 500_000_000),
                recipient("bob", 300_000_000),
                recipient("carol", 200_000_000),
            ],
        }
    }

    fn utxo(id: u8, value: u64) -> UnspentOutput {
        UnspentOutput {
            tx_id: TxId([id; 32]),
            vout: 0,
            value,
            block_height: 10,
            is_coinbase: false,
            token_meta: None,
        }
    }

    struct Harness {
        indexer: Arc<MemoryIndexer>,
        broadcaster: Arc<DryRunBroadcaster>,
        executor: PayoutExecutor,
    }

    fn harness_with(
        config: PayoutConfig,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> (Arc<MemoryIndexer>, PayoutExecutor) {
        let indexer = Arc::new(MemoryIndexer::new(1_000));
        let collaborators = Collaborators {
            config_store: Arc::new(MemoryConfigStore::with_config(config)),
            balances: indexer.clone(),
            proofs: Arc::new(StaticProofVerifier::new().with_proof("proof", Address::new(FUND))),
            addresses: Arc::new(CharsetAddressValidator::default()),
            utxos: indexer.clone(),
            builders: Arc::new(DraftTxBuilderFactory),
            broadcaster,
        };
        let mut settings = EngineSettings::new(625_000, 1_000_000, 10);
        settings.explorer_base_url = "https://explorer.test/".to_string();
        let secrets = Secrets {
            signing_key: Some(SigningKey::new("key")),
            funding_address: Some(Address::new(FUND)),
        };
        (indexer, PayoutExecutor::new(settings, secrets, collaborators))
    }

    fn harness() -> Harness {
        let broadcaster = Arc::new(DryRunBroadcaster::new());
        let (indexer, executor) = harness_with(config(), broadcaster.clone());
        Harness {
            indexer,
            broadcaster,
            executor,
        }
    }

    #[tokio::test]
    async fn test_balance_at_threshold_does_not_pay() {
        let h = harness();
        h.indexer.set_balance(Address::new(FUND), 625_000).await;
        h.indexer.set_utxos(Address::new(FUND), vec![utxo(1, 2_000_000)]).await;

        let outcome = h.executor.run_cycle(1).await.expect("cycle");
        assert_eq!(
            outcome,
            CycleOutcome::BelowThreshold {
                balance: 625_000,
                threshold: 625_000,
            }
        );
        assert_eq!(h.broadcaster.submitted().await, 0);
        assert_eq!(h.indexer.utxo_queries(), 0);
    }

    #[tokio::test]
    async fn test_balance_above_threshold_pays() {
        let h = harness();
        h.indexer.set_balance(Address::new(FUND), 625_001).await;
        h.indexer
            .set_utxos(
                Address::new(FUND),
                vec![utxo(1, 700_000), utxo(2, 300_000), utxo(3, 100_000)],
            )
            .await;

        let outcome = h.executor.run_cycle(2).await.expect("cycle");
        let receipt = match outcome {
            CycleOutcome::Paid(receipt) => receipt,
            other => unreachable!("expected payout, got {other:?}"),
        };
        let amounts: Vec<u64> = receipt.outputs.iter().map(|o| o.amount).collect();
        assert_eq!(amounts, vec![500_000, 300_000, 200_000]);
        // 3 payouts + change at 10 per output
        assert_eq!(receipt.fee, 40);
        assert_eq!(receipt.input_count, 3);
        assert_eq!(receipt.total_selected, 1_100_000);
        assert_eq!(receipt.change, 1_100_000 - 1_000_040);
        assert_eq!(
            receipt.explorer_link,
            format!("https://explorer.test/tx/{}", receipt.tx_id)
        );
        assert_eq!(h.broadcaster.submitted().await, 1);
    }

    #[tokio::test]
    async fn test_ineligible_stops_before_selection() {
        let mut cfg = config();
        cfg.recipients[1].is_valid = false;
        let (indexer, executor) = harness_with(cfg, Arc::new(DryRunBroadcaster::new()));
        indexer.set_balance(Address::new(FUND), 10_000_000).await;

        let outcome = executor.run_cycle(3).await.expect("cycle");
        match outcome {
            CycleOutcome::Ineligible(snapshot) => {
                assert_eq!(snapshot.failed(), vec!["recipient[1].is_valid"]);
            }
            other => unreachable!("expected ineligible, got {other:?}"),
        }
        assert_eq!(indexer.utxo_queries(), 0);
    }

    #[tokio::test]
    async fn test_invalid_distribution_fails_in_planning() {
        let mut cfg = config();
        cfg.recipients[0].reward_distribution.percentage = Percentage::from_ppb(600_000_000);
        let (indexer, executor) = harness_with(cfg, Arc::new(DryRunBroadcaster::new()));
        indexer.set_balance(Address::new(FUND), 10_000_000).await;

        let err = executor.run_cycle(4).await.expect_err("invalid table");
        assert_eq!(err.state, CycleState::Planning);
        assert_eq!(err.kind.kind(), "invalid_distribution");
        assert_eq!(indexer.utxo_queries(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_funds_fails_in_selecting() {
        let h = harness();
        h.indexer.set_balance(Address::new(FUND), 10_000_000).await;
        h.indexer.set_utxos(Address::new(FUND), vec![utxo(1, 999_999)]).await;

        let err = h.executor.run_cycle(5).await.expect_err("insufficient");
        assert_eq!(err.state, CycleState::Selecting);
        assert!(matches!(
            err.kind,
            EngineError::InsufficientFunds {
                needed: 1_000_040,
                available: 999_999,
            }
        ));
        assert_eq!(h.broadcaster.submitted().await, 0);
    }

    #[tokio::test]
    async fn test_zero_outputs_dropped_from_fee_and_tx() {
        let mut cfg = config();
        cfg.recipients[2].reward_distribution.percentage = Percentage::ZERO;
        let broadcaster = Arc::new(DryRunBroadcaster::new());
        let (indexer, executor) = harness_with(cfg, broadcaster.clone());
        indexer.set_balance(Address::new(FUND), 10_000_000).await;
        indexer.set_utxos(Address::new(FUND), vec![utxo(1, 5_000_000)]).await;

        let outcome = executor.run_cycle(6).await.expect("cycle");
        let receipt = match outcome {
            CycleOutcome::Paid(receipt) => receipt,
            other => unreachable!("expected payout, got {other:?}"),
        };
        assert_eq!(receipt.outputs.len(), 2);
        assert_eq!(receipt.fee, 30);
        assert_eq!(receipt.change, 5_000_000 - 800_030);

        let tx = broadcaster.last().await.expect("submitted tx");
        let draft: serde_json::Value = serde_json::from_slice(&tx).expect("draft json");
        let outputs = draft["outputs"].as_array().expect("outputs");
        // two payouts and the change output, change last
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[2]["address"], FUND);
        assert_eq!(outputs[2]["amount"], 5_000_000 - 800_030);
        assert_eq!(draft["signatures"].as_array().expect("sigs").len(), 1);
    }

    #[tokio::test]
    async fn test_blank_recipient_address_is_ineligible() {
        let mut cfg = config();
        cfg.recipients[0].reward_distribution.address = Address::new("");
        let (indexer, executor) = harness_with(cfg, Arc::new(DryRunBroadcaster::new()));
        indexer.set_balance(Address::new(FUND), 10_000_000).await;

        let outcome = executor.run_cycle(7).await.expect("cycle");
        assert!(matches!(outcome, CycleOutcome::Ineligible(_)));
    }

    struct RejectingBuilder;

    impl TxBuilder for RejectingBuilder {
        fn add_input(&mut self, _utxo: &UnspentOutput) -> std::result::Result<(), BuildRejection> {
            Ok(())
        }

        fn add_output(
            &mut self,
            address: &Address,
            _amount: u64,
        ) -> std::result::Result<(), BuildRejection> {
            Err(BuildRejection(format!("unsupported address {address}")))
        }

        fn sign(
            &mut self,
            _utxo: &UnspentOutput,
            _key: &SigningKey,
        ) -> std::result::Result<(), BuildRejection> {
            Ok(())
        }

        fn serialize(&self) -> std::result::Result<Vec<u8>, BuildRejection> {
            Ok(Vec::new())
        }
    }

    struct RejectingFactory;

    impl TxBuilderFactory for RejectingFactory {
        fn builder(&self) -> Box<dyn TxBuilder> {
            Box::new(RejectingBuilder)
        }
    }

    #[tokio::test]
    async fn test_builder_rejection_fails_in_building() {
        let broadcaster = Arc::new(DryRunBroadcaster::new());
        let indexer = Arc::new(MemoryIndexer::new(1_000));
        let collaborators = Collaborators {
            config_store: Arc::new(MemoryConfigStore::with_config(config())),
            balances: indexer.clone(),
            proofs: Arc::new(StaticProofVerifier::new().with_proof("proof", Address::new(FUND))),
            addresses: Arc::new(CharsetAddressValidator::default()),
            utxos: indexer.clone(),
            builders: Arc::new(RejectingFactory),
            broadcaster: broadcaster.clone(),
        };
        let secrets = Secrets {
            signing_key: Some(SigningKey::new("key")),
            funding_address: Some(Address::new(FUND)),
        };
        let executor =
            PayoutExecutor::new(EngineSettings::new(0, 1_000_000, 10), secrets, collaborators);
        indexer.set_balance(Address::new(FUND), 10_000_000).await;
        indexer.set_utxos(Address::new(FUND), vec![utxo(1, 5_000_000)]).await;

        let err = executor.run_cycle(11).await.expect_err("rejected");
        assert_eq!(err.state, CycleState::Building);
        assert_eq!(err.kind.kind(), "build");
        assert_eq!(broadcaster.submitted().await, 0);
    }

    struct EmptyAckBroadcaster;

    #[async_trait]
    impl Broadcaster for EmptyAckBroadcaster {
        async fn submit(&self, _tx: &[u8]) -> std::result::Result<BroadcastAck, ServiceError> {
            Ok(BroadcastAck {
                tx_id: "  ".to_string(),
            })
        }
    }

    struct DownBroadcaster;

    #[async_trait]
    impl Broadcaster for DownBroadcaster {
        async fn submit(&self, _tx: &[u8]) -> std::result::Result<BroadcastAck, ServiceError> {
            Err(ServiceError::Unavailable("502 bad gateway".to_string()))
        }
    }

    #[tokio::test]
    async fn test_empty_broadcast_response_is_broadcast_error() {
        let (indexer, executor) = harness_with(config(), Arc::new(EmptyAckBroadcaster));
        indexer.set_balance(Address::new(FUND), 10_000_000).await;
        indexer.set_utxos(Address::new(FUND), vec![utxo(1, 5_000_000)]).await;

        let err = executor.run_cycle(8).await.expect_err("empty ack");
        assert_eq!(err.state, CycleState::Broadcasting);
        assert_eq!(err.kind.kind(), "broadcast");
    }

    #[tokio::test]
    async fn test_unreachable_broadcaster_is_external_error() {
        let (indexer, executor) = harness_with(config(), Arc::new(DownBroadcaster));
        indexer.set_balance(Address::new(FUND), 10_000_000).await;
        indexer.set_utxos(Address::new(FUND), vec![utxo(1, 5_000_000)]).await;

        let err = executor.run_cycle(9).await.expect_err("down");
        assert_eq!(err.state, CycleState::Broadcasting);
        assert!(err.kind.is_external());
    }

    #[tokio::test]
    async fn test_polls_funding_address_spelling() {
        let broadcaster = Arc::new(DryRunBroadcaster::new());
        let indexer = Arc::new(MemoryIndexer::new(1_000));
        let collaborators = Collaborators {
            config_store: Arc::new(MemoryConfigStore::with_config(config())),
            balances: indexer.clone(),
            proofs: Arc::new(StaticProofVerifier::new().with_proof("proof", Address::new(FUND))),
            addresses: Arc::new(CharsetAddressValidator::default()),
            utxos: indexer.clone(),
            builders: Arc::new(DraftTxBuilderFactory),
            broadcaster: broadcaster.clone(),
        };
        // Same wallet as the config's "fund1", spelled differently.
        let funding = Address::new("FUND1");
        let secrets = Secrets {
            signing_key: Some(SigningKey::new("key")),
            funding_address: Some(funding.clone()),
        };
        let executor =
            PayoutExecutor::new(EngineSettings::new(625_000, 1_000_000, 10), secrets, collaborators);
        indexer.set_balance(funding.clone(), 10_000_000).await;
        indexer.set_utxos(funding, vec![utxo(1, 10_000_000)]).await;

        let outcome = executor.run_cycle(12).await.expect("cycle");
        assert!(matches!(outcome, CycleOutcome::Paid(_)), "got {outcome:?}");
        assert_eq!(indexer.balance_queries(), 1);
        assert_eq!(broadcaster.submitted().await, 1);
    }

    #[tokio::test]
    async fn test_balance_failure_fails_in_polling() {
        let h = harness();
        h.indexer.fail_balances(true);
        let err = h.executor.run_cycle(10).await.expect_err("oracle down");
        assert_eq!(err.state, CycleState::Polling);
        assert!(err.kind.is_external());
        assert_eq!(err.cycle_id, 10);
    }

    #[test]
    fn test_explorer_link_trims_slash() {
        let mut settings = EngineSettings::new(0, 0, 0);
        settings.explorer_base_url = "https://x.test/".to_string();
        assert_eq!(settings.explorer_link("ab"), "https://x.test/tx/ab");
    }
}
