//! # keeper-ledger
//!
//! Access to the external blockchain ledger. Every call is a blocking,
//! suspend-until-answered step from the caller's point of view: reads return
//! the ledger's current value, writes return only once the transaction is
//! confirmed (or fail).
//!
//! ## Modules
//!
//! - [`ledger`] — the [`Ledger`] trait and its value types
//! - [`rpc`] — JSON-RPC 2.0 over HTTPS client
//! - [`memory`] — in-memory ledger with failure injection
//! - [`vault`] — Vault State Reader

pub mod ledger;
pub mod memory;
pub mod rpc;
pub mod vault;

pub use ledger::{AprInfo, AprUpdate, Ledger};

use keeper_types::{ErrorClass, TxHash};

/// Error types for ledger access.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The endpoint could not be reached.
    #[error("{method}: endpoint unreachable: {detail}")]
    Unreachable {
        /// RPC method being called.
        method: String,
        /// Transport error detail.
        detail: String,
    },

    /// No answer within the request timeout.
    #[error("{method}: no response within {after_secs}s")]
    Timeout {
        /// RPC method being called.
        method: String,
        /// Configured request timeout.
        after_secs: u64,
    },

    /// The endpoint answered with something other than a valid result.
    #[error("{method}: protocol error: {detail}")]
    Protocol {
        /// RPC method being called.
        method: String,
        /// What was wrong with the answer.
        detail: String,
    },

    /// The ledger refused to accept a write.
    #[error("{method}: rejected by ledger (code {code}): {message}")]
    Rejected {
        /// RPC method being called.
        method: String,
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// The transaction was mined but reverted.
    #[error("transaction {tx_hash} reverted: {reason}")]
    Reverted {
        /// Reverted transaction.
        tx_hash: TxHash,
        /// Revert reason, or "unknown".
        reason: String,
    },

    /// The transaction was submitted but not confirmed in time.
    #[error("transaction {tx_hash} not confirmed within {after_secs}s")]
    ConfirmationTimeout {
        /// Pending transaction.
        tx_hash: TxHash,
        /// Configured confirmation timeout.
        after_secs: u64,
    },

    /// The transaction was submitted but reading its receipt failed, so
    /// whether it landed is unknown.
    #[error("transaction {tx_hash} submitted, receipt unavailable: {source}")]
    ReceiptUnavailable {
        /// Submitted transaction.
        tx_hash: TxHash,
        /// Read failure.
        #[source]
        source: Box<LedgerError>,
    },
}

impl LedgerError {
    /// Operator-facing class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Unreachable { .. }
            | Self::Timeout { .. }
            | Self::Protocol { .. }
            | Self::ReceiptUnavailable { .. } => ErrorClass::Network,
            Self::Rejected { .. } | Self::Reverted { .. } | Self::ConfirmationTimeout { .. } => {
                ErrorClass::TransactionFailure
            }
        }
    }
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
