//! Sequential distribution against the ledger.
//!
//! Transfers go out one at a time in table order. Before each one the
//! treasury balance is re-read so that funds moved by someone else between
//! planning and execution surface as [`PayoutError::InsufficientFunds`]
//! instead of a reverted transaction. A payout is recorded only after the
//! ledger confirms it.
//!
//! The engine itself keeps no memory between runs: calling
//! [`DistributionEngine::distribute`] twice with the same balance pays every
//! role twice. Runs that must not repeat go through [`crate::guard`].

use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use keeper_ledger::{Ledger, LedgerError};
use keeper_store::log::AppendLog;
use keeper_types::units::{amount_str, format_units, pow10};
use keeper_types::{Address, PayoutRecord};

use crate::table::{Allocation, DistributionPlan, RoleTable};
use crate::{PartialDistribution, PayoutError, Result};

/// Per-run execution options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Epoch stamped on every record, when the epoch guard is on.
    pub epoch: Option<u64>,
    /// Table indices already paid in this epoch.
    pub already_paid: BTreeSet<usize>,
}

/// Why an allocation was not transferred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The floor division produced zero.
    ZeroAmount,
    /// The payout ledger already holds this role for the epoch.
    AlreadyPaid,
}

/// An allocation the run passed over.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Skipped {
    /// The allocation.
    pub allocation: Allocation,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Outcome of a completed run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DistributionReport {
    /// Epoch, when guarded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch: Option<u64>,
    /// Balance the plan was computed from.
    #[serde(with = "amount_str")]
    pub balance: u128,
    /// Confirmed payouts in table order.
    pub paid: Vec<PayoutRecord>,
    /// Allocations not transferred.
    pub skipped: Vec<Skipped>,
    /// Rounding remainder left in the treasury.
    #[serde(with = "amount_str")]
    pub remainder: u128,
}

/// Pays a role table out of the treasury.
pub struct DistributionEngine<'a, L> {
    ledger: &'a L,
    table: &'a RoleTable,
    treasury: Address,
    decimals: u8,
}

impl<'a, L: Ledger> DistributionEngine<'a, L> {
    /// Create an engine paying `table` from `treasury`.
    ///
    /// # Errors
    ///
    /// [`PayoutError::Units`] if `decimals` cannot be represented.
    pub fn new(
        ledger: &'a L,
        table: &'a RoleTable,
        treasury: Address,
        decimals: u8,
    ) -> Result<Self> {
        pow10(decimals)?;
        Ok(Self {
            ledger,
            table,
            treasury,
            decimals,
        })
    }

    /// The role table.
    pub fn table(&self) -> &RoleTable {
        self.table
    }

    /// Treasury address.
    pub fn treasury(&self) -> Address {
        self.treasury
    }

    /// Read the treasury's current token balance.
    pub async fn treasury_balance(&self) -> Result<u128> {
        self.ledger
            .balance_of(&self.treasury)
            .await
            .map_err(PayoutError::Balance)
    }

    /// Plan `balance` over the table without touching the ledger.
    pub fn plan(&self, balance: u128) -> DistributionPlan {
        self.table.plan(balance)
    }

    /// Plan and pay `balance`, appending each confirmed payout to `sink`.
    pub async fn distribute<S: AppendLog<PayoutRecord>>(
        &self,
        balance: u128,
        sink: &mut S,
    ) -> std::result::Result<DistributionReport, PartialDistribution> {
        let plan = self.plan(balance);
        self.execute(&plan, sink, &RunOptions::default()).await
    }

    /// Pay an existing plan.
    ///
    /// Halts at the first failure. The error carries every payout confirmed
    /// before it and every allocation still owed, starting with the one that
    /// failed.
    pub async fn execute<S: AppendLog<PayoutRecord>>(
        &self,
        plan: &DistributionPlan,
        sink: &mut S,
        options: &RunOptions,
    ) -> std::result::Result<DistributionReport, PartialDistribution> {
        info!(
            balance = %plan.balance,
            roles = plan.allocations.len(),
            remainder = %plan.remainder,
            epoch = ?options.epoch,
            "distribution started"
        );

        let mut paid = Vec::new();
        let mut skipped = Vec::new();

        for (pos, allocation) in plan.allocations.iter().enumerate() {
            if options.already_paid.contains(&allocation.index) {
                skipped.push(Skipped {
                    allocation: allocation.clone(),
                    reason: SkipReason::AlreadyPaid,
                });
                continue;
            }
            if allocation.amount == 0 {
                skipped.push(Skipped {
                    allocation: allocation.clone(),
                    reason: SkipReason::ZeroAmount,
                });
                continue;
            }

            match self.pay(allocation, options.epoch).await {
                Ok(record) => {
                    if let Err(source) = sink.append(&record) {
                        let tx_hash = record.tx_hash.clone();
                        paid.push(record);
                        return Err(self.halt(
                            plan,
                            pos + 1,
                            options,
                            paid,
                            PayoutError::Record {
                                role: allocation.label.clone(),
                                tx_hash,
                                source,
                            },
                        ));
                    }
                    paid.push(record);
                }
                Err(source) => return Err(self.halt(plan, pos, options, paid, source)),
            }
        }

        info!(paid = paid.len(), skipped = skipped.len(), "distribution complete");
        Ok(DistributionReport {
            epoch: options.epoch,
            balance: plan.balance,
            paid,
            skipped,
            remainder: plan.remainder,
        })
    }

    async fn pay(&self, allocation: &Allocation, epoch: Option<u64>) -> Result<PayoutRecord> {
        let ledger_err = |source: LedgerError| PayoutError::Ledger {
            role: allocation.label.clone(),
            address: allocation.address,
            source,
        };

        let amount = format_units(allocation.amount, self.decimals)?;
        let available = self
            .ledger
            .balance_of(&self.treasury)
            .await
            .map_err(ledger_err)?;
        if available < allocation.amount {
            return Err(PayoutError::InsufficientFunds {
                role: allocation.label.clone(),
                address: allocation.address,
                required: allocation.amount,
                available,
            });
        }

        let receipt = self
            .ledger
            .transfer(&allocation.address, allocation.amount)
            .await
            .map_err(ledger_err)?;
        if !receipt.succeeded() {
            return Err(ledger_err(LedgerError::Reverted {
                reason: receipt
                    .revert_reason
                    .unwrap_or_else(|| "transfer reverted".to_string()),
                tx_hash: receipt.tx_hash,
            }));
        }

        info!(
            role = %allocation.label,
            address = %allocation.address,
            amount = %amount,
            tx_hash = %receipt.tx_hash,
            "payout confirmed"
        );
        Ok(PayoutRecord {
            role_label: allocation.label.clone(),
            address: allocation.address,
            amount,
            amount_units: allocation.amount,
            timestamp: Utc::now(),
            tx_hash: receipt.tx_hash,
            epoch,
        })
    }

    fn halt(
        &self,
        plan: &DistributionPlan,
        from: usize,
        options: &RunOptions,
        paid: Vec<PayoutRecord>,
        source: PayoutError,
    ) -> PartialDistribution {
        let unpaid: Vec<Allocation> = plan.allocations[from..]
            .iter()
            .filter(|a| a.amount > 0 && !options.already_paid.contains(&a.index))
            .cloned()
            .collect();
        warn!(
            error = %source,
            paid = paid.len(),
            unpaid = unpaid.len(),
            "distribution halted"
        );
        PartialDistribution {
            paid,
            unpaid,
            source,
        }
    }
}
