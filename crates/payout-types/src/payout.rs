//! Per-cycle derived values: planned outputs, eligibility and receipts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Address;

/// A planned payout to one recipient. Recomputed every cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutOutput {
    /// Destination address.
    pub address: Address,
    /// Amount in base units.
    pub amount: u64,
}

/// Outcome of an eligibility check.
///
/// Every condition is always present so that a negative result can be
/// diagnosed from the map alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilitySnapshot {
    /// Logical AND of all conditions.
    pub overall: bool,
    /// Named conditions, ordered by name.
    pub conditions: BTreeMap<String, bool>,
}

impl EligibilitySnapshot {
    /// Build a snapshot from evaluated conditions.
    ///
    /// An empty condition set is eligible.
    pub fn from_conditions(conditions: BTreeMap<String, bool>) -> Self {
        let overall = conditions.values().all(|&ok| ok);
        Self {
            overall,
            conditions,
        }
    }

    /// Names of the conditions that evaluated to `false`.
    pub fn failed(&self) -> Vec<&str> {
        self.conditions
            .iter()
            .filter(|(_, &ok)| !ok)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Result of a successful payout broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReceipt {
    /// Identifier reported by the broadcaster.
    pub tx_id: String,
    /// Block explorer link for the transaction.
    pub explorer_link: String,
    /// Flat fee deducted from the change output.
    pub fee: u64,
    /// Sum of the selected input values.
    pub total_selected: u64,
    /// Value returned to the funding address.
    pub change: u64,
    /// Number of inputs spent.
    pub input_count: usize,
    /// Non-zero payout outputs, in plan order.
    pub outputs: Vec<PayoutOutput>,
}
