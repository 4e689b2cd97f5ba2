//! # payout-types
//!
//! Shared domain types used across the payout workspace.
//!
//! ## Modules
//!
//! - [`amount`] — Exact decimal percentages and informational amounts
//! - [`utxo`] — Unspent outputs and transaction identifiers
//! - [`config`] — Payout configuration and versioned snapshots
//! - [`payout`] — Planned outputs, eligibility diagnostics and receipts

pub mod amount;
pub mod config;
pub mod payout;
pub mod utxo;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use amount::{Decimal, Percentage};
pub use config::{ConfigSnapshot, PayoutConfig, RecipientEntry, RewardDistribution};
pub use payout::{EligibilitySnapshot, PayoutOutput, PayoutReceipt};
pub use utxo::{TokenMeta, TxId, UnspentOutput};

/// Default coinbase maturity depth in blocks.
pub const DEFAULT_COINBASE_MATURITY: u32 = 100;

/// Fixed-point scale of [`Percentage`]: parts per billion.
pub const PERCENTAGE_SCALE: u64 = 1_000_000_000;

/// Number of fractional digits a [`Percentage`] can carry.
pub const PERCENTAGE_DECIMALS: usize = 9;

/// A ledger address.
///
/// The core never interprets the encoding; well-formedness and
/// canonicalisation are delegated to an address validator.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    /// Create an address from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw address text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the address text is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Error types for parsing domain values.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// A decimal literal could not be parsed.
    #[error("invalid decimal {input:?}: {reason}")]
    InvalidDecimal {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A transaction id was not 32 bytes of hex.
    #[error("invalid transaction id: {0}")]
    InvalidTxId(String),
}

/// Convenience result type for type parsing.
pub type Result<T> = std::result::Result<T, TypesError>;
