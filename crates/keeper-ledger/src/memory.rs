//! In-memory ledger.
//!
//! Holds token balances and the vault's APR fields, confirms writes
//! immediately, and can be told to fail in the ways the real gateway does:
//! become unreachable, revert the n-th transfer, or lose balance to outside
//! activity right before the n-th transfer. Used by tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use keeper_types::{Address, RoleId, TxReceipt, TxStatus};

use crate::ledger::{AprInfo, AprUpdate, Ledger};
use crate::{LedgerError, Result};

/// A transfer the ledger confirmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedTransfer {
    /// Recipient.
    pub to: Address,
    /// Amount in minor units.
    pub amount: u128,
    /// Hash assigned by the ledger.
    pub tx_hash: String,
}

#[derive(Debug, Default)]
struct State {
    balances: HashMap<Address, u128>,
    apr: AprInfo,
    roles: HashSet<(RoleId, Address)>,
    ledger_now: Option<u64>,
    unreachable: bool,
    transfer_attempts: usize,
    revert_transfer_at: Option<usize>,
    drain_before_transfer: Option<(usize, u128)>,
    reject_adjustment: Option<String>,
    transfers: Vec<ConfirmedTransfer>,
    adjustments: Vec<AprUpdate>,
    tx_counter: u64,
}

impl State {
    fn next_hash(&mut self) -> String {
        self.tx_counter += 1;
        format!("0x{:064x}", self.tx_counter)
    }

    fn check_reachable(&self, method: &str) -> Result<()> {
        if self.unreachable {
            return Err(LedgerError::Unreachable {
                method: method.to_string(),
                detail: "memory ledger marked unreachable".to_string(),
            });
        }
        Ok(())
    }

    fn receipt(&mut self) -> TxReceipt {
        TxReceipt {
            tx_hash: self.next_hash(),
            status: TxStatus::Success,
            block_number: Some(self.tx_counter),
            revert_reason: None,
        }
    }
}

/// [`Ledger`] implementation held entirely in memory.
#[derive(Debug)]
pub struct MemoryLedger {
    treasury: Address,
    state: Mutex<State>,
}

impl MemoryLedger {
    /// Create an empty ledger whose transfers are paid by `treasury`.
    pub fn new(treasury: Address) -> Self {
        Self {
            treasury,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the token balance of `account`.
    pub fn set_balance(&self, account: Address, amount: u128) {
        self.state().balances.insert(account, amount);
    }

    /// Current token balance of `account`.
    pub fn balance(&self, account: &Address) -> u128 {
        self.state().balances.get(account).copied().unwrap_or(0)
    }

    /// Replace the vault's APR fields.
    pub fn set_apr_info(&self, info: AprInfo) {
        self.state().apr = info;
    }

    /// Current vault APR fields.
    pub fn apr(&self) -> AprInfo {
        self.state().apr.clone()
    }

    /// Enforce the ledger-side cooldown against `now` on `adjust_apr`.
    pub fn set_ledger_now(&self, now: u64) {
        self.state().ledger_now = Some(now);
    }

    /// Make every call fail as unreachable.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Revert the `n`-th transfer attempt (1-based).
    pub fn revert_transfer_at(&self, n: usize) {
        self.state().revert_transfer_at = Some(n);
    }

    /// Move `amount` out of the treasury right before the `n`-th transfer
    /// attempt (1-based), after any balance check done before it.
    pub fn drain_before_transfer(&self, n: usize, amount: u128) {
        self.state().drain_before_transfer = Some((n, amount));
    }

    /// Reject the next adjustment with `message`.
    pub fn reject_adjustment(&self, message: impl Into<String>) {
        self.state().reject_adjustment = Some(message.into());
    }

    /// Transfers confirmed so far, in order.
    pub fn transfers(&self) -> Vec<ConfirmedTransfer> {
        self.state().transfers.clone()
    }

    /// Adjustments committed so far, in order.
    pub fn adjustments(&self) -> Vec<AprUpdate> {
        self.state().adjustments.clone()
    }

    /// Grant a role without going through a transaction.
    pub fn insert_role(&self, role: RoleId, account: Address) {
        self.state().roles.insert((role, account));
    }
}

impl Ledger for MemoryLedger {
    async fn balance_of(&self, account: &Address) -> Result<u128> {
        let state = self.state();
        state.check_reachable("balanceOf")?;
        Ok(state.balances.get(account).copied().unwrap_or(0))
    }

    async fn apr_info(&self) -> Result<AprInfo> {
        let state = self.state();
        state.check_reachable("getAPRInfo")?;
        Ok(state.apr.clone())
    }

    async fn adjust_apr(&self, update: &AprUpdate) -> Result<TxReceipt> {
        let mut state = self.state();
        state.check_reachable("adjustAPR")?;
        if let Some(message) = state.reject_adjustment.take() {
            return Err(LedgerError::Rejected {
                method: "adjustAPR".to_string(),
                code: -32000,
                message,
            });
        }
        if let Some(now) = state.ledger_now {
            if now < state.apr.next_adjustment_time {
                let tx_hash = state.next_hash();
                return Err(LedgerError::Reverted {
                    tx_hash,
                    reason: "cooldown active".to_string(),
                });
            }
        }
        state.apr.current_apr_bps = update.new_apr_bps;
        state.apr.next_adjustment_time = update.next_adjustment_time;
        state.adjustments.push(update.clone());
        Ok(state.receipt())
    }

    async fn transfer(&self, to: &Address, amount: u128) -> Result<TxReceipt> {
        let mut state = self.state();
        state.check_reachable("transfer")?;
        state.transfer_attempts += 1;
        let attempt = state.transfer_attempts;

        if let Some((n, drained)) = state.drain_before_transfer {
            if n == attempt {
                let balance = state.balances.entry(self.treasury).or_default();
                *balance = balance.saturating_sub(drained);
            }
        }

        if state.revert_transfer_at == Some(attempt) {
            let tx_hash = state.next_hash();
            return Err(LedgerError::Reverted {
                tx_hash,
                reason: "transfer reverted".to_string(),
            });
        }

        let available = state.balances.get(&self.treasury).copied().unwrap_or(0);
        if available < amount {
            let tx_hash = state.next_hash();
            return Err(LedgerError::Reverted {
                tx_hash,
                reason: format!("insufficient balance: {available} < {amount}"),
            });
        }

        state.balances.insert(self.treasury, available - amount);
        *state.balances.entry(*to).or_default() += amount;
        let receipt = state.receipt();
        state.transfers.push(ConfirmedTransfer {
            to: *to,
            amount,
            tx_hash: receipt.tx_hash.clone(),
        });
        Ok(receipt)
    }

    async fn has_role(&self, role: &RoleId, account: &Address) -> Result<bool> {
        let state = self.state();
        state.check_reachable("hasRole")?;
        Ok(state.roles.contains(&(*role, *account)))
    }

    async fn grant_role(&self, role: &RoleId, account: &Address) -> Result<TxReceipt> {
        let mut state = self.state();
        state.check_reachable("grantRole")?;
        state.roles.insert((*role, *account));
        Ok(state.receipt())
    }
}
