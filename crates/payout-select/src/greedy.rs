//! Greedy largest-first selection.
//!
//! ```text
//! spendable = candidates
//!     - outputs carrying token metadata
//!     - coinbase outputs with depth < coinbase_maturity
//! sort spendable by (value desc, tx_id asc, vout asc)
//! take the shortest prefix whose sum >= target
//! ```
//!
//! The ordering is total, so the same candidate set and target always
//! produce the same selection regardless of the order the indexer
//! returned the outputs in.

use std::cmp::Ordering;

use payout_types::{UnspentOutput, DEFAULT_COINBASE_MATURITY};
use serde::{Deserialize, Serialize};

use crate::{Result, SelectError};

/// Spendability rules applied before selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    /// Minimum depth, in blocks, before a coinbase output may be spent.
    pub coinbase_maturity: u32,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            coinbase_maturity: DEFAULT_COINBASE_MATURITY,
        }
    }
}

/// A covering subset of the candidates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    /// Chosen outputs in selection order (largest first).
    pub chosen: Vec<UnspentOutput>,
    /// Sum of the chosen values.
    pub total: u64,
}

/// Whether `utxo` may be spent at `current_height` under `policy`.
pub fn is_spendable(utxo: &UnspentOutput, current_height: u32, policy: &SelectionPolicy) -> bool {
    if utxo.token_meta.is_some() {
        return false;
    }
    if utxo.is_coinbase {
        return match utxo.depth(current_height) {
            Some(depth) => depth >= policy.coinbase_maturity,
            None => false,
        };
    }
    true
}

/// Selection order: value descending, then `tx_id` and `vout` ascending.
fn selection_order(a: &UnspentOutput, b: &UnspentOutput) -> Ordering {
    b.value
        .cmp(&a.value)
        .then_with(|| a.tx_id.cmp(&b.tx_id))
        .then_with(|| a.vout.cmp(&b.vout))
}

/// Select outputs covering `target`.
///
/// # Arguments
///
/// * `candidates` - Outputs reported for the funding address
/// * `target` - Amount to cover, payouts plus fee
/// * `current_height` - Chain tip used for coinbase maturity
/// * `policy` - Spendability rules
///
/// # Errors
///
/// - [`SelectError::InsufficientFunds`] if the spendable outputs sum below `target`
/// - [`SelectError::Overflow`] if the spendable outputs sum above `u64::MAX`
pub fn select(
    candidates: &[UnspentOutput],
    target: u64,
    current_height: u32,
    policy: &SelectionPolicy,
) -> Result<Selection> {
    let mut spendable: Vec<&UnspentOutput> = candidates
        .iter()
        .filter(|u| is_spendable(u, current_height, policy))
        .collect();
    spendable.sort_by(|a, b| selection_order(a, b));

    let mut chosen = Vec::new();
    let mut total: u64 = 0;
    for utxo in &spendable {
        if total >= target {
            break;
        }
        total = total.checked_add(utxo.value).ok_or(SelectError::Overflow)?;
        chosen.push((*utxo).clone());
    }

    if total < target {
        tracing::debug!(
            needed = target,
            available = total,
            candidates = candidates.len(),
            spendable = spendable.len(),
            "coin selection: insufficient funds"
        );
        // The loop consumed every spendable output, so `total` is their sum.
        return Err(SelectError::InsufficientFunds {
            needed: target,
            available: total,
        });
    }

    tracing::debug!(
        needed = target,
        total,
        inputs = chosen.len(),
        skipped = candidates.len() - spendable.len(),
        "coin selection complete"
    );

    Ok(Selection { chosen, total })
}
