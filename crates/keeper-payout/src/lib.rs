//! # keeper-payout
//!
//! Distribution Engine: pays a treasury balance out to a fixed, role-weighted
//! wallet table.
//!
//! Each role receives `floor(balance * share_bps / 10000)`. The rounding
//! remainder stays in the treasury and is reported with every plan. Transfers
//! run one at a time in table order because they share one signer nonce; the
//! first failure halts the run and the already-confirmed payouts are reported
//! alongside the unpaid ones.
//!
//! ## Modules
//!
//! - [`table`] — validated role table and distribution plans
//! - [`engine`] — sequential execution against the ledger
//! - [`guard`] — opt-in per-epoch idempotency

pub mod engine;
pub mod guard;
pub mod table;

use keeper_ledger::LedgerError;
use keeper_store::StoreError;
use keeper_types::{Address, ErrorClass, PayoutRecord, TypesError};

use crate::table::Allocation;

/// Error types for distribution.
#[derive(Debug, thiserror::Error)]
pub enum PayoutError {
    /// The role table is empty.
    #[error("role table is empty")]
    EmptyTable,

    /// Shares do not sum to 10000 basis points.
    #[error("role shares must sum to 10000 bps, got {total}")]
    InvalidShareTotal {
        /// The actual total.
        total: u64,
    },

    /// A role has a zero share.
    #[error("role {label:?} has a zero share")]
    ZeroShare {
        /// Offending role.
        label: String,
    },

    /// A role pays to the zero address.
    #[error("role {label:?} pays to the zero address")]
    ZeroAddress {
        /// Offending role.
        label: String,
    },

    /// Amount formatting failed (unsupported decimals).
    #[error(transparent)]
    Units(#[from] TypesError),

    /// The treasury holds less than the next transfer needs.
    #[error("insufficient funds for {role:?} ({address}): need {required}, treasury holds {available}")]
    InsufficientFunds {
        /// Role being paid.
        role: String,
        /// Recipient.
        address: Address,
        /// Planned amount in minor units.
        required: u128,
        /// Treasury balance in minor units.
        available: u128,
    },

    /// A ledger call failed while paying a role.
    #[error("paying {role:?} ({address}): {source}")]
    Ledger {
        /// Role being paid.
        role: String,
        /// Recipient.
        address: Address,
        /// Underlying ledger failure.
        #[source]
        source: LedgerError,
    },

    /// Reading the treasury balance before planning failed.
    #[error("reading treasury balance: {0}")]
    Balance(#[source] LedgerError),

    /// A payout was confirmed but could not be written to the payout ledger.
    #[error("payout to {role:?} confirmed in {tx_hash} but not recorded: {source}")]
    Record {
        /// Role that was paid.
        role: String,
        /// Confirmed transfer.
        tx_hash: String,
        /// Store failure.
        #[source]
        source: StoreError,
    },

    /// The epoch guard could not read or write its journal.
    #[error("epoch guard: {0}")]
    Guard(#[source] StoreError),
}

impl PayoutError {
    /// Operator-facing class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::EmptyTable
            | Self::InvalidShareTotal { .. }
            | Self::ZeroShare { .. }
            | Self::ZeroAddress { .. }
            | Self::Units(_) => ErrorClass::Configuration,
            Self::InsufficientFunds { .. } => ErrorClass::InsufficientFunds,
            Self::Ledger { source, .. } | Self::Balance(source) => source.class(),
            Self::Record { source, .. } | Self::Guard(source) => source.class(),
        }
    }
}

/// Convenience result type for distribution operations.
pub type Result<T> = std::result::Result<T, PayoutError>;

/// A distribution that stopped part-way.
///
/// Payouts in `paid` were confirmed by the ledger (and, unless the error is
/// [`PayoutError::Record`], written to the payout ledger). Allocations in
/// `unpaid` were not transferred.
#[derive(Debug, thiserror::Error)]
#[error(
    "distribution halted after {done} of {total} payouts: {source}",
    done = .paid.len(),
    total = .paid.len() + .unpaid.len()
)]
pub struct PartialDistribution {
    /// Confirmed payouts, in order.
    pub paid: Vec<PayoutRecord>,
    /// Allocations not transferred, starting with the one that failed.
    pub unpaid: Vec<Allocation>,
    /// What halted the run.
    #[source]
    pub source: PayoutError,
}

impl PartialDistribution {
    /// Operator-facing class of the halting error.
    pub fn class(&self) -> ErrorClass {
        self.source.class()
    }
}
