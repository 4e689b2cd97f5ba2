//! # payout-engine
//!
//! Threshold-triggered payout engine.
//!
//! Each cycle polls the funding balance, checks eligibility, plans the
//! recipient outputs, selects inputs, builds and signs the transaction
//! through an external builder, and broadcasts it. A scheduler fires
//! cycles on a fixed period and never lets two overlap.
//!
//! ```text
//! Idle -> Polling -> CheckingEligibility -> Planning -> Selecting
//!      -> Building -> Broadcasting -> Idle
//! ```
//!
//! Any error ends the cycle and returns to `Idle`; the next tick is the
//! retry.
//!
//! ## Modules
//!
//! - [`collaborators`] — External service traits and call timeouts
//! - [`secrets`] — Signing key and funding address
//! - [`store`] — In-memory versioned config store
//! - [`eligibility`] — Go/no-go aggregation with diagnostics
//! - [`executor`] — The per-cycle state machine
//! - [`scheduler`] — Periodic ticks with a reentrancy guard
//! - [`stub`] — Dry-run collaborators for development and tests

pub mod collaborators;
pub mod eligibility;
pub mod executor;
pub mod scheduler;
pub mod secrets;
pub mod store;
pub mod stub;

use payout_select::SelectError;
use payout_split::PlanError;

use crate::collaborators::{ServiceError, StoreError};

/// Error types for a payout cycle.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Spendable outputs do not cover payouts plus fee.
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds {
        /// Payouts plus fee, in base units.
        needed: u64,
        /// Sum of spendable outputs, in base units.
        available: u64,
    },

    /// The recipient percentage table is invalid.
    #[error("invalid distribution: {0}")]
    InvalidDistribution(PlanError),

    /// The transaction builder rejected an input or output.
    #[error("build error: {0}")]
    Build(String),

    /// The broadcaster rejected the transaction or returned no id.
    #[error("broadcast error: {0}")]
    Broadcast(String),

    /// A collaborator was unreachable, failed or timed out.
    #[error("external service {service} failed: {detail}")]
    ExternalService {
        /// Which collaborator.
        service: &'static str,
        /// Failure detail.
        detail: String,
    },

    /// A config save lost an optimistic-concurrency race.
    #[error("config version conflict: expected {expected}, found {actual}")]
    ConfigConflict {
        /// Version the writer based its edit on.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// Engine or payout configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Arithmetic overflow.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
}

impl EngineError {
    /// Short machine-friendly name of the error kind, for logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InsufficientFunds { .. } => "insufficient_funds",
            EngineError::InvalidDistribution(_) => "invalid_distribution",
            EngineError::Build(_) => "build",
            EngineError::Broadcast(_) => "broadcast",
            EngineError::ExternalService { .. } => "external_service",
            EngineError::ConfigConflict { .. } => "config_conflict",
            EngineError::Config(_) => "config",
            EngineError::Overflow(_) => "overflow",
        }
    }

    /// Whether the failure came from an unreachable or failing collaborator.
    pub fn is_external(&self) -> bool {
        matches!(self, EngineError::ExternalService { .. })
    }

    pub(crate) fn external(service: &'static str, err: ServiceError) -> Self {
        EngineError::ExternalService {
            service,
            detail: err.to_string(),
        }
    }
}

impl From<SelectError> for EngineError {
    fn from(err: SelectError) -> Self {
        match err {
            SelectError::InsufficientFunds { needed, available } => {
                EngineError::InsufficientFunds { needed, available }
            }
            SelectError::Overflow => EngineError::Overflow("coin selection"),
        }
    }
}

impl From<PlanError> for EngineError {
    fn from(err: PlanError) -> Self {
        if err.is_invalid_distribution() {
            EngineError::InvalidDistribution(err)
        } else {
            EngineError::Overflow("payout plan")
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { expected, actual } => {
                EngineError::ConfigConflict { expected, actual }
            }
            StoreError::InvalidDistribution(plan) => EngineError::InvalidDistribution(plan),
            other => EngineError::ExternalService {
                service: "config_store",
                detail: other.to_string(),
            },
        }
    }
}

/// Convenience result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
