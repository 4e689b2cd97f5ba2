//! # payout-select
//!
//! Coin selection for payout transactions.
//!
//! Selection is greedy largest-first over the spendable subset of the
//! funding address's outputs. It minimises the number of inputs (smaller
//! transactions, fewer signatures) at the cost of fragmenting the UTXO set
//! faster over time.
//!
//! ## Modules
//!
//! - [`greedy`] — Largest-first selection with deterministic tie-breaking

pub mod greedy;

/// Error types for coin selection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    /// The spendable outputs do not cover the target.
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds {
        /// The target amount in base units.
        needed: u64,
        /// Sum of all spendable candidates in base units.
        available: u64,
    },

    /// Arithmetic overflow while summing candidate values.
    #[error("arithmetic overflow in selection total")]
    Overflow,
}

/// Convenience result type for selection operations.
pub type Result<T> = std::result::Result<T, SelectError>;
