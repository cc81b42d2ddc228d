//! Operator-facing error classes.
//!
//! Every crate error maps to exactly one class; the binary turns the class
//! into a process exit code and the `error_class` field of the run report.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse failure class shared by all components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Missing or invalid static configuration. Never retried.
    Configuration,
    /// Adjustment attempted before the cooldown expired. Clean exit.
    CooldownActive,
    /// RPC endpoint unreachable, timed out, or answered garbage.
    Network,
    /// The ledger rejected, reverted, or never confirmed a transaction.
    TransactionFailure,
    /// A transfer exceeded the treasury balance at execution time.
    InsufficientFunds,
    /// Local persistence (payout ledger, journals) failed.
    Storage,
}

impl ErrorClass {
    /// Process exit code for this class.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::CooldownActive => 0,
            Self::Configuration => 2,
            Self::Network => 3,
            Self::TransactionFailure => 4,
            Self::InsufficientFunds => 5,
            Self::Storage => 6,
        }
    }

    /// Stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::CooldownActive => "cooldown_active",
            Self::Network => "network",
            Self::TransactionFailure => "transaction_failure",
            Self::InsufficientFunds => "insufficient_funds",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
