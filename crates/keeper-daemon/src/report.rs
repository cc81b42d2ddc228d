//! The JSON run report printed on stdout by every command.

use serde::Serialize;
use serde_json::{json, Value};

use keeper_apr::AprError;
use keeper_ledger::LedgerError;
use keeper_payout::{PartialDistribution, PayoutError};
use keeper_store::StoreError;
use keeper_types::ErrorClass;

use crate::config::ConfigError;

/// How a command ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A new rate was committed.
    Committed,
    /// Adjustment rejected: cooldown active.
    Rejected,
    /// Distribution paid every due role.
    Completed,
    /// Dry run: plan only.
    Planned,
    /// Distribution halted part-way.
    Partial,
    /// Read-only status.
    Status,
    /// Scheduler stopped on signal.
    Stopped,
    /// Fatal error before any effect.
    Failed,
}

/// Single-line JSON report of one command.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    /// Command name.
    pub command: &'static str,
    /// How it ended.
    pub outcome: Outcome,
    /// Error class, when not a clean success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
    /// Error message, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Command-specific detail.
    pub detail: Value,
}

impl RunReport {
    /// A successful report.
    pub fn ok(command: &'static str, outcome: Outcome, detail: Value) -> Self {
        Self {
            command,
            outcome,
            error_class: None,
            message: None,
            detail,
        }
    }

    /// A report for a command that failed.
    pub fn failed(command: &'static str, failure: Failure) -> Self {
        Self {
            command,
            outcome: failure.outcome,
            error_class: Some(failure.class),
            message: Some(failure.message),
            detail: failure.detail,
        }
    }

    /// Process exit code.
    pub fn exit_code(&self) -> i32 {
        self.error_class.map_or(0, ErrorClass::exit_code)
    }
}

/// A classified command failure.
#[derive(Debug)]
pub struct Failure {
    /// Operator-facing class.
    pub class: ErrorClass,
    /// Outcome to report.
    pub outcome: Outcome,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub detail: Value,
}

impl Failure {
    fn new(class: ErrorClass, message: String) -> Self {
        Self {
            class,
            outcome: Outcome::Failed,
            message,
            detail: Value::Null,
        }
    }
}

impl From<ConfigError> for Failure {
    fn from(e: ConfigError) -> Self {
        Self::new(ErrorClass::Configuration, e.to_string())
    }
}

impl From<LedgerError> for Failure {
    fn from(e: LedgerError) -> Self {
        Self::new(e.class(), e.to_string())
    }
}

impl From<StoreError> for Failure {
    fn from(e: StoreError) -> Self {
        Self::new(e.class(), e.to_string())
    }
}

impl From<AprError> for Failure {
    fn from(e: AprError) -> Self {
        let detail = match &e {
            AprError::CooldownActive {
                remaining_secs,
                next_adjustment_time,
            } => json!({
                "remaining_secs": remaining_secs,
                "next_adjustment_time": next_adjustment_time,
            }),
            AprError::InvalidBounds { min_bps, max_bps } => json!({
                "min_bps": min_bps,
                "max_bps": max_bps,
            }),
            AprError::Record { tx_hash, .. } => json!({ "tx_hash": tx_hash }),
            _ => Value::Null,
        };
        let outcome = match e {
            AprError::CooldownActive { .. } => Outcome::Rejected,
            _ => Outcome::Failed,
        };
        Self {
            outcome,
            detail,
            ..Self::new(e.class(), e.to_string())
        }
    }
}

impl From<PayoutError> for Failure {
    fn from(e: PayoutError) -> Self {
        Self::new(e.class(), e.to_string())
    }
}

impl From<PartialDistribution> for Failure {
    fn from(e: PartialDistribution) -> Self {
        let outcome = if e.paid.is_empty() {
            Outcome::Failed
        } else {
            Outcome::Partial
        };
        Self {
            class: e.class(),
            outcome,
            message: e.to_string(),
            detail: json!({
                "paid": e.paid,
                "unpaid": e.unpaid,
            }),
        }
    }
}
