//! Immutable records produced after the external ledger confirms an update.
//!
//! Records are serialized in camelCase because the payout ledger and the
//! deployment records are shared with external dashboards and setup scripts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::{Address, TxHash};
use crate::units::amount_str;

/// Outcome of a mined transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Executed successfully.
    Success,
    /// Reverted by the contract.
    Reverted,
}

/// Confirmation returned by the ledger for a write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Execution status.
    pub status: TxStatus,
    /// Block that included the transaction, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Revert reason, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
}

impl TxReceipt {
    /// Whether the transaction executed successfully.
    pub fn succeeded(&self) -> bool {
        self.status == TxStatus::Success
    }
}

/// One confirmed payout. Appended to the payout ledger, never rewritten.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRecord {
    /// Role label from the payout table.
    pub role_label: String,
    /// Recipient address.
    pub address: Address,
    /// Whole-token decimal string at the token's fixed precision.
    pub amount: String,
    /// Same amount in minor units.
    #[serde(with = "amount_str")]
    pub amount_units: u128,
    /// Confirmation time.
    pub timestamp: DateTime<Utc>,
    /// Transfer transaction hash.
    pub tx_hash: TxHash,
    /// Distribution epoch, set when the epoch guard is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
}

/// Audit twin of a committed APR change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRecord {
    /// Rate before the adjustment, in basis points.
    pub previous_apr: u32,
    /// Committed rate, in basis points.
    pub new_apr: u32,
    /// Confirmation time.
    pub timestamp: DateTime<Utc>,
    /// Vault total that drove the computation, in minor units.
    #[serde(with = "amount_str")]
    pub triggering_deposit: u128,
    /// Cooldown end committed alongside the rate.
    pub next_adjustment_time: u64,
    /// Adjustment transaction hash.
    pub tx_hash: TxHash,
}

/// Contract deployment record written by the setup scripts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Deployed contract address.
    pub address: Address,
    /// Network name the contract lives on.
    pub network: String,
    /// Deployment time (ISO-8601).
    pub timestamp: DateTime<Utc>,
}
