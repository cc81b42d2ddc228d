//! # keeper-apr
//!
//! APR Controller: a cooldown-gated state machine that recomputes the
//! staking reward rate from the vault's total deposits.
//!
//! Each run starts from state read fresh off the ledger and ends in exactly
//! one of two ways: rejected because the cooldown is active (nothing is
//! written), or committed with a new rate clamped into the policy bounds.
//!
//! ## Modules
//!
//! - [`policy`] — bounds, adjustment period and the deposit tier schedule
//! - [`controller`] — the `adjust` decision and the committing controller

pub mod controller;
pub mod policy;

use keeper_ledger::LedgerError;
use keeper_store::StoreError;
use keeper_types::ErrorClass;

/// Error types for APR adjustment.
#[derive(Debug, thiserror::Error)]
pub enum AprError {
    /// Adjustment attempted before the cooldown expired.
    #[error("cooldown active: {remaining_secs}s remaining (next adjustment at {next_adjustment_time})")]
    CooldownActive {
        /// Seconds until the cooldown ends.
        remaining_secs: u64,
        /// When the cooldown ends.
        next_adjustment_time: u64,
    },

    /// Rate bounds are inconsistent.
    #[error("invalid APR bounds: min {min_bps} bps, max {max_bps} bps")]
    InvalidBounds {
        /// Configured lower bound.
        min_bps: u32,
        /// Configured upper bound.
        max_bps: u32,
    },

    /// The deposit tier schedule is unusable.
    #[error("invalid tier schedule: {0}")]
    InvalidTiers(String),

    /// Adjustment period is zero.
    #[error("adjustment period must be positive")]
    ZeroPeriod,

    /// Reading or committing through the ledger failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The adjustment was committed but could not be recorded locally.
    #[error("adjustment committed in {tx_hash} but not recorded: {source}")]
    Record {
        /// Committed transaction.
        tx_hash: String,
        /// Store failure.
        #[source]
        source: StoreError,
    },
}

impl AprError {
    /// Operator-facing class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::CooldownActive { .. } => ErrorClass::CooldownActive,
            Self::InvalidBounds { .. } | Self::InvalidTiers(_) | Self::ZeroPeriod => {
                ErrorClass::Configuration
            }
            Self::Ledger(e) => e.class(),
            Self::Record { source, .. } => source.class(),
        }
    }
}

/// Convenience result type for APR operations.
pub type Result<T> = std::result::Result<T, AprError>;
