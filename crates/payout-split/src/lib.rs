//! # payout-split
//!
//! Converts the recipient percentage table into concrete payout outputs.
//!
//! Percentages are shares of a configured base payout unit. Amounts are
//! floored, never rounded, so a valid table can never pay out more than
//! the base unit.
//!
//! ## Modules
//!
//! - [`planner`] — Distribution validation and output planning

pub mod planner;

/// Error types for payout planning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// A single entry's percentage lies outside `[0, 1]`.
    #[error("recipient {index} has percentage {percentage}, must be within [0, 1]")]
    EntryOutOfRange {
        /// Position of the entry in the recipient table.
        index: usize,
        /// The offending percentage as decimal text.
        percentage: String,
    },

    /// Recipient percentages sum above one.
    #[error("recipient percentages sum to {total}, must not exceed 1")]
    TotalExceedsOne {
        /// The actual total as decimal text.
        total: String,
    },

    /// Arithmetic overflow.
    #[error("arithmetic overflow in payout plan")]
    Overflow,
}

impl PlanError {
    /// Whether this error means the distribution table itself is invalid.
    pub fn is_invalid_distribution(&self) -> bool {
        matches!(
            self,
            PlanError::EntryOutOfRange { .. } | PlanError::TotalExceedsOne { .. }
        )
    }
}

/// Convenience result type for planning operations.
pub type Result<T> = std::result::Result<T, PlanError>;
