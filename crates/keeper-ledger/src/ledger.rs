//! The external ledger as seen by the keeper.

use serde::{Deserialize, Serialize};

use keeper_types::units::amount_str;
use keeper_types::{Address, RoleId, TxReceipt};

use crate::Result;

/// Vault and reward-rate fields returned by `getAPRInfo()`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AprInfo {
    /// Current rate in basis points.
    #[serde(rename = "currentAPR")]
    pub current_apr_bps: u32,
    /// Unix timestamp when the ledger-side cooldown ends.
    pub next_adjustment_time: u64,
    /// Total deposited in the vault, in minor units.
    #[serde(with = "amount_str")]
    pub total_deposited: u128,
}

/// A rate change submitted as one logical ledger update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AprUpdate {
    /// New rate in basis points.
    #[serde(rename = "newAPR")]
    pub new_apr_bps: u32,
    /// New cooldown end.
    pub next_adjustment_time: u64,
}

/// Read/write operations the keeper consumes from the external ledger.
///
/// Writes resolve only after confirmation. A write that was mined but
/// reverted is returned as [`LedgerError::Reverted`](crate::LedgerError::Reverted),
/// never as an `Ok` receipt, so `Ok` always means the ledger state changed.
#[allow(async_fn_in_trait)]
pub trait Ledger {
    /// Token balance of `account`, in minor units.
    async fn balance_of(&self, account: &Address) -> Result<u128>;

    /// Current rate, cooldown end and vault total.
    async fn apr_info(&self) -> Result<AprInfo>;

    /// Commit a new rate and cooldown end.
    async fn adjust_apr(&self, update: &AprUpdate) -> Result<TxReceipt>;

    /// Transfer `amount` minor units from the treasury signer to `to`.
    async fn transfer(&self, to: &Address, amount: u128) -> Result<TxReceipt>;

    /// Whether `account` holds `role` on the vault contract.
    async fn has_role(&self, role: &RoleId, account: &Address) -> Result<bool>;

    /// Grant `role` to `account` on the vault contract.
    async fn grant_role(&self, role: &RoleId, account: &Address) -> Result<TxReceipt>;
}
