//! Opt-in per-epoch idempotency.
//!
//! The first guarded run of an epoch records the balance it planned from in
//! the epoch journal. Any later run in the same epoch replans from that
//! snapshot, so per-role amounts come out identical, and skips roles that
//! already have a record for the epoch in the payout ledger. Duplicate
//! `(label, address)` rows in the table are matched one record each.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::info;

use keeper_ledger::Ledger;
use keeper_store::epochs::{EpochEntry, EpochJournal};
use keeper_store::log::AppendLog;
use keeper_types::PayoutRecord;

use crate::engine::{DistributionEngine, RunOptions};
use crate::table::{DistributionPlan, RoleTable};
use crate::{PayoutError, Result};

/// A plan resolved against the epoch journal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardedRun {
    /// Plan for the epoch's balance snapshot.
    pub plan: DistributionPlan,
    /// Options to execute it with.
    pub options: RunOptions,
    /// Whether the epoch had already been started.
    pub resumed: bool,
}

/// Table indices that already have a payout record in `epoch`.
pub fn paid_indices(records: &[PayoutRecord], table: &RoleTable, epoch: u64) -> BTreeSet<usize> {
    let mut pending: Vec<&PayoutRecord> =
        records.iter().filter(|r| r.epoch == Some(epoch)).collect();
    let mut paid = BTreeSet::new();
    for (index, role) in table.roles().iter().enumerate() {
        if let Some(pos) = pending
            .iter()
            .position(|r| r.role_label == role.label && r.address == role.address)
        {
            pending.swap_remove(pos);
            paid.insert(index);
        }
    }
    paid
}

/// Gate for one distribution epoch.
pub struct EpochGuard<'j> {
    journal: &'j mut EpochJournal,
    epoch: u64,
}

impl<'j> EpochGuard<'j> {
    /// Guard `epoch` using `journal`.
    pub fn new(journal: &'j mut EpochJournal, epoch: u64) -> Self {
        Self { journal, epoch }
    }

    /// The guarded epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Resolve the run for this epoch, starting the epoch if needed.
    pub async fn prepare<L: Ledger, S: AppendLog<PayoutRecord>>(
        &mut self,
        engine: &DistributionEngine<'_, L>,
        payouts: &S,
    ) -> Result<GuardedRun> {
        self.resolve(engine, payouts, true).await
    }

    /// Resolve the run for this epoch without writing the journal.
    pub async fn preview<L: Ledger, S: AppendLog<PayoutRecord>>(
        &mut self,
        engine: &DistributionEngine<'_, L>,
        payouts: &S,
    ) -> Result<GuardedRun> {
        self.resolve(engine, payouts, false).await
    }

    async fn resolve<L: Ledger, S: AppendLog<PayoutRecord>>(
        &mut self,
        engine: &DistributionEngine<'_, L>,
        payouts: &S,
        begin: bool,
    ) -> Result<GuardedRun> {
        let existing = self.journal.find(self.epoch).map_err(PayoutError::Guard)?;
        let (balance, resumed) = match existing {
            Some(entry) => (entry.balance_snapshot, true),
            None => {
                let balance = engine.treasury_balance().await?;
                if begin {
                    self.journal
                        .begin(&EpochEntry {
                            epoch: self.epoch,
                            balance_snapshot: balance,
                            started_at: Utc::now(),
                        })
                        .map_err(PayoutError::Guard)?;
                }
                (balance, false)
            }
        };

        let records = payouts.entries().map_err(PayoutError::Guard)?;
        let already_paid = paid_indices(&records, engine.table(), self.epoch);
        if resumed {
            info!(
                epoch = self.epoch,
                balance_snapshot = %balance,
                already_paid = already_paid.len(),
                "resuming distribution epoch"
            );
        }

        Ok(GuardedRun {
            plan: engine.plan(balance),
            options: RunOptions {
                epoch: Some(self.epoch),
                already_paid,
            },
            resumed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keeper_ledger::memory::MemoryLedger;
    use keeper_types::{Address, WalletRole};

    const TREASURY: Address = Address::new([0xee; 20]);

    fn table() -> RoleTable {
        RoleTable::new(vec![
            WalletRole {
                label: "ops".into(),
                address: Address::new([1; 20]),
                share_bps: 4000,
            },
            WalletRole {
                label: "dev".into(),
                address: Address::new([2; 20]),
                share_bps: 3000,
            },
            WalletRole {
                label: "grants".into(),
                address: Address::new([3; 20]),
                share_bps: 3000,
            },
        ])
        .expect("table")
    }

    #[tokio::test]
    async fn test_resume_after_partial_failure() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let mut journal = EpochJournal::new(tmp.path().join("epochs.json"));
        let ledger = MemoryLedger::new(TREASURY);
        ledger.set_balance(TREASURY, 10_000);
        ledger.revert_transfer_at(2);
        let table = table();
        let engine = DistributionEngine::new(&ledger, &table, TREASURY, 0).expect("engine");
        let mut payouts: Vec<PayoutRecord> = Vec::new();

        let run = EpochGuard::new(&mut journal, 42)
            .prepare(&engine, &payouts)
            .await
            .expect("prepare");
        assert!(!run.resumed);
        let partial = engine
            .execute(&run.plan, &mut payouts, &run.options)
            .await
            .expect_err("second transfer reverts");
        assert_eq!(partial.paid.len(), 1);

        // Treasury is now 6000, but the epoch replans from the 10000 snapshot.
        let run = EpochGuard::new(&mut journal, 42)
            .prepare(&engine, &payouts)
            .await
            .expect("prepare again");
        assert!(run.resumed);
        assert_eq!(run.plan.balance, 10_000);
        assert_eq!(run.options.already_paid, BTreeSet::from([0]));

        let report = engine
            .execute(&run.plan, &mut payouts, &run.options)
            .await
            .expect("resume");
        assert_eq!(report.paid.len(), 2);
        assert_eq!(payouts.len(), 3);
        assert_eq!(ledger.balance(&Address::new([1; 20])), 4_000);
        assert_eq!(ledger.balance(&Address::new([2; 20])), 3_000);
        assert_eq!(ledger.balance(&TREASURY), 0);

        // A third run in the same epoch pays nothing.
        let run = EpochGuard::new(&mut journal, 42)
            .prepare(&engine, &payouts)
            .await
            .expect("prepare third");
        let report = engine
            .execute(&run.plan, &mut payouts, &run.options)
            .await
            .expect("noop");
        assert!(report.paid.is_empty());
        assert_eq!(ledger.transfers().len(), 3);
    }

    #[tokio::test]
    async fn test_preview_does_not_start_epoch() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let mut journal = EpochJournal::new(tmp.path().join("epochs.json"));
        let ledger = MemoryLedger::new(TREASURY);
        ledger.set_balance(TREASURY, 500);
        let table = table();
        let engine = DistributionEngine::new(&ledger, &table, TREASURY, 0).expect("engine");
        let payouts: Vec<PayoutRecord> = Vec::new();

        let run = EpochGuard::new(&mut journal, 1)
            .preview(&engine, &payouts)
            .await
            .expect("preview");
        assert_eq!(run.plan.balance, 500);
        assert!(journal.find(1).expect("find").is_none());
    }

    #[test]
    fn test_paid_indices_ignores_other_epochs() {
        let table = table();
        let record = |label: &str, byte: u8, epoch: Option<u64>| PayoutRecord {
            role_label: label.into(),
            address: Address::new([byte; 20]),
            amount: "1".into(),
            amount_units: 1,
            timestamp: Utc::now(),
            tx_hash: "0x1".into(),
            epoch,
        };
        let records = vec![
            record("ops", 1, Some(3)),
            record("dev", 2, Some(4)),
            record("grants", 3, None),
            record("grants", 3, Some(4)),
        ];
        assert_eq!(paid_indices(&records, &table, 4), BTreeSet::from([1, 2]));
        assert_eq!(paid_indices(&records, &table, 3), BTreeSet::from([0]));
    }
}
