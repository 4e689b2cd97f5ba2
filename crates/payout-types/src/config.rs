//! Payout configuration.
//!
//! The configuration is the single source of truth for who gets paid and
//! from where. The engine reads one [`ConfigSnapshot`] per cycle and never
//! mutates it.

use serde::{Deserialize, Serialize};

use crate::{Address, Decimal, Percentage};

/// Where a recipient's share is sent and how large it is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDistribution {
    /// Destination address of the payout output.
    pub address: Address,
    /// Share of the base payout unit, in `[0, 1]`.
    pub percentage: Percentage,
}

/// One row of the recipient table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientEntry {
    /// Address the recipient was observed at.
    pub source_address: Address,
    /// Amount observed at the source address (informational).
    #[serde(default)]
    pub observed_amount: Decimal,
    /// Whether the entry has been marked valid.
    #[serde(default)]
    pub is_valid: bool,
    /// Payout destination and share.
    pub reward_distribution: RewardDistribution,
}

/// The payout configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutConfig {
    /// Address the payout is funded from.
    pub payout_address: Address,
    /// Externally issued eligibility proof.
    #[serde(default)]
    pub proof: String,
    /// Recipient table, in payout order.
    #[serde(default)]
    pub recipients: Vec<RecipientEntry>,
}

impl PayoutConfig {
    /// Sum of all recipient percentages, or `None` on overflow.
    pub fn total_percentage(&self) -> Option<Percentage> {
        self.recipients
            .iter()
            .try_fold(0u64, |acc, r| acc.checked_add(r.reward_distribution.percentage.ppb()))
            .map(Percentage::from_ppb)
    }
}

/// A configuration together with its optimistic-concurrency version.
///
/// Version `0` denotes a store that has never been written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Monotonic version token, incremented by every successful save.
    pub version: u64,
    /// The configuration at that version.
    pub config: PayoutConfig,
}
