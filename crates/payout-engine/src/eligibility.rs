//! Eligibility aggregation.
//!
//! Every condition is evaluated on every check, even once one has already
//! failed, so the resulting map always explains a negative decision in
//! full. An external call that errors or times out counts as a failed
//! condition; it never aborts the check.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use payout_types::{Address, EligibilitySnapshot, PayoutConfig};
use tracing::{debug, warn};

use crate::collaborators::{bounded, AddressValidator, ProofVerifier};
use crate::secrets::Secrets;

/// The external verifier accepts the proof.
pub const PROOF_VALID: &str = "proof_valid";
/// The proof was issued for the configured payout address.
pub const PROOF_MATCHES_PAYOUT_ADDRESS: &str = "proof_matches_payout_address";
/// A signing key is configured.
pub const SIGNING_KEY_PRESENT: &str = "signing_key_present";
/// A funding address is configured.
pub const FUNDING_ADDRESS_PRESENT: &str = "funding_address_present";
/// The configured funding address is the one the payout config pays from.
pub const FUNDING_ADDRESS_MATCHES: &str = "funding_address_matches";
/// The payout config's own address is well formed.
pub const PAYOUT_ADDRESS_WELL_FORMED: &str = "payout_address_well_formed";

/// Condition key for a recipient's reward address format.
pub fn recipient_address_key(index: usize) -> String {
    format!("recipient[{index}].address_well_formed")
}

/// Condition key for a recipient's validity flag.
pub fn recipient_valid_key(index: usize) -> String {
    format!("recipient[{index}].is_valid")
}

/// Aggregates payout preconditions into a go/no-go decision.
#[derive(Clone)]
pub struct EligibilityChecker {
    proofs: Arc<dyn ProofVerifier>,
    addresses: Arc<dyn AddressValidator>,
    call_timeout: Duration,
}

impl EligibilityChecker {
    /// Create a checker over the given collaborators.
    pub fn new(
        proofs: Arc<dyn ProofVerifier>,
        addresses: Arc<dyn AddressValidator>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            proofs,
            addresses,
            call_timeout,
        }
    }

    /// Evaluate every condition for `config` and `secrets`.
    pub async fn check(&self, config: &PayoutConfig, secrets: &Secrets) -> EligibilitySnapshot {
        let mut conditions = BTreeMap::new();

        conditions.insert(PROOF_VALID.to_string(), self.proof_valid(&config.proof).await);
        conditions.insert(
            PROOF_MATCHES_PAYOUT_ADDRESS.to_string(),
            self.proof_matches(&config.proof, &config.payout_address).await,
        );

        conditions.insert(
            SIGNING_KEY_PRESENT.to_string(),
            secrets.signing_key().is_some(),
        );
        conditions.insert(
            FUNDING_ADDRESS_PRESENT.to_string(),
            secrets.funding_address().is_some(),
        );
        let funding_matches = secrets
            .funding_address()
            .map(|funding| self.same_address(funding, &config.payout_address))
            .unwrap_or(false);
        conditions.insert(FUNDING_ADDRESS_MATCHES.to_string(), funding_matches);

        conditions.insert(
            PAYOUT_ADDRESS_WELL_FORMED.to_string(),
            self.addresses.is_well_formed(&config.payout_address),
        );

        for (index, recipient) in config.recipients.iter().enumerate() {
            conditions.insert(
                recipient_address_key(index),
                self.addresses
                    .is_well_formed(&recipient.reward_distribution.address),
            );
            conditions.insert(recipient_valid_key(index), recipient.is_valid);
        }

        let snapshot = EligibilitySnapshot::from_conditions(conditions);
        debug!(
            overall = snapshot.overall,
            conditions = snapshot.conditions.len(),
            "eligibility evaluated"
        );
        snapshot
    }

    async fn proof_valid(&self, proof: &str) -> bool {
        if proof.trim().is_empty() {
            return false;
        }
        match bounded(self.call_timeout, self.proofs.verify(proof)).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!(error = %e, "proof verification failed, treating proof as invalid");
                false
            }
        }
    }

    async fn proof_matches(&self, proof: &str, payout_address: &Address) -> bool {
        if proof.trim().is_empty() {
            return false;
        }
        match bounded(self.call_timeout, self.proofs.decode(proof)).await {
            Ok(decoded) => self.same_address(&decoded.payout_address, payout_address),
            Err(e) => {
                warn!(error = %e, "proof decoding failed, treating address as unmatched");
                false
            }
        }
    }

    fn same_address(&self, a: &Address, b: &Address) -> bool {
        !a.is_blank()
            && !b.is_blank()
            && self.addresses.to_canonical(a) == self.addresses.to_canonical(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SigningKey;
    use crate::stub::{CharsetAddressValidator, StaticProofVerifier};
    use async_trait::async_trait;
    use payout_types::{Decimal, Percentage, RecipientEntry, RewardDistribution};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::collaborators::{DecodedProof, ServiceError};

    fn recipient(addr: &str, is_valid: bool) -> RecipientEntry {
        RecipientEntry {
            source_address: Address::new("src1"),
            observed_amount: Decimal::default(),
            is_valid,
            reward_distribution: RewardDistribution {
                address: Address::new(addr),
                percentage: Percentage::from_ppb(100_000_000),
            },
        }
    }

    fn good_config() -> PayoutConfig {
        PayoutConfig {
            payout_address: Address::new("fund1"),
            proof: "proof-ok".to_string(),
            recipients: vec![recipient("dst1", true), recipient("dst2", true)],
        }
    }

    fn good_secrets() -> Secrets {
        Secrets {
            signing_key: Some(SigningKey::new("key")),
            funding_address: Some(Address::new("FUND1")),
        }
    }

    fn checker() -> EligibilityChecker {
        let proofs = StaticProofVerifier::new().with_proof("proof-ok", Address::new("fund1"));
        EligibilityChecker::new(
            Arc::new(proofs),
            Arc::new(CharsetAddressValidator::default()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_all_conditions_hold() {
        let snap = checker().check(&good_config(), &good_secrets()).await;
        assert!(snap.overall, "failed: {:?}", snap.failed());
        // 6 global + 2 per recipient
        assert_eq!(snap.conditions.len(), 10);
    }

    #[tokio::test]
    async fn test_no_short_circuit() {
        let mut config = good_config();
        config.proof = "unknown".to_string();
        config.recipients[1].is_valid = false;
        config.recipients[0].reward_distribution.address = Address::new("bad address!");
        let secrets = Secrets::default();

        let snap = checker().check(&config, &secrets).await;
        assert!(!snap.overall);
        assert_eq!(snap.conditions.len(), 10);
        let failed = snap.failed();
        assert!(failed.contains(&PROOF_VALID));
        assert!(failed.contains(&PROOF_MATCHES_PAYOUT_ADDRESS));
        assert!(failed.contains(&SIGNING_KEY_PRESENT));
        assert!(failed.contains(&FUNDING_ADDRESS_PRESENT));
        assert!(failed.contains(&FUNDING_ADDRESS_MATCHES));
        assert!(failed.contains(&"recipient[0].address_well_formed"));
        assert!(failed.contains(&"recipient[1].is_valid"));
        assert!(!failed.contains(&"recipient[0].is_valid"));
    }

    #[tokio::test]
    async fn test_funding_address_mismatch() {
        let mut secrets = good_secrets();
        secrets.funding_address = Some(Address::new("fund2"));
        let snap = checker().check(&good_config(), &secrets).await;
        assert!(!snap.overall);
        assert_eq!(snap.failed(), vec![FUNDING_ADDRESS_MATCHES]);
    }

    #[tokio::test]
    async fn test_proof_for_other_address() {
        let mut config = good_config();
        config.proof = "proof-other".to_string();
        let proofs = StaticProofVerifier::new().with_proof("proof-other", Address::new("elsewhere"));
        let checker = EligibilityChecker::new(
            Arc::new(proofs),
            Arc::new(CharsetAddressValidator::default()),
            Duration::from_secs(5),
        );
        let snap = checker.check(&config, &good_secrets()).await;
        assert_eq!(snap.failed(), vec![PROOF_MATCHES_PAYOUT_ADDRESS]);
    }

    #[tokio::test]
    async fn test_empty_recipients_add_no_conditions() {
        let mut config = good_config();
        config.recipients.clear();
        let snap = checker().check(&config, &good_secrets()).await;
        assert!(snap.overall);
        assert_eq!(snap.conditions.len(), 6);
    }

    struct UnreachableVerifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProofVerifier for UnreachableVerifier {
        async fn verify(&self, _proof: &str) -> Result<bool, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::Unavailable("connection refused".to_string()))
        }

        async fn decode(&self, _proof: &str) -> Result<DecodedProof, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<Result<DecodedProof, ServiceError>>().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_verifier_degrades_to_false() {
        let verifier = Arc::new(UnreachableVerifier {
            calls: AtomicUsize::new(0),
        });
        let checker = EligibilityChecker::new(
            verifier.clone(),
            Arc::new(CharsetAddressValidator::default()),
            Duration::from_secs(5),
        );
        let snap = checker.check(&good_config(), &good_secrets()).await;
        assert!(!snap.overall);
        assert_eq!(
            snap.failed(),
            vec![PROOF_MATCHES_PAYOUT_ADDRESS, PROOF_VALID]
        );
        // no retries
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 2);
    }
}
