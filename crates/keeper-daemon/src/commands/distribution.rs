//! `run-distribution`: pay the treasury balance out to the role table.

use serde_json::json;

use keeper_ledger::Ledger;
use keeper_payout::engine::{DistributionEngine, RunOptions};
use keeper_payout::guard::EpochGuard;
use keeper_store::epochs::epoch_of;

use super::{Keeper, Result};
use crate::report::{Outcome, RunReport};

/// Command name for reports.
pub const COMMAND: &str = "run-distribution";

/// Run one distribution at `now`. With `dry_run`, print the plan only.
pub async fn run<L: Ledger>(keeper: &mut Keeper<L>, now: u64, dry_run: bool) -> Result {
    let engine = DistributionEngine::new(
        &keeper.ledger,
        &keeper.table,
        keeper.contracts.treasury,
        keeper.decimals,
    )?;

    let (plan, options, resumed) = if keeper.epoch_guard {
        let mut guard = EpochGuard::new(&mut keeper.store.epochs, epoch_of(now));
        let run = if dry_run {
            guard.preview(&engine, &keeper.store.payouts).await?
        } else {
            guard.prepare(&engine, &keeper.store.payouts).await?
        };
        (run.plan, run.options, run.resumed)
    } else {
        let balance = engine.treasury_balance().await?;
        (engine.plan(balance), RunOptions::default(), false)
    };

    if dry_run {
        return Ok(RunReport::ok(
            COMMAND,
            Outcome::Planned,
            json!({
                "plan": plan,
                "epoch": options.epoch,
                "already_paid": options.already_paid,
                "resumed": resumed,
            }),
        ));
    }

    let report = engine
        .execute(&plan, &mut keeper.store.payouts, &options)
        .await?;
    Ok(RunReport::ok(
        COMMAND,
        Outcome::Completed,
        json!({
            "report": report,
            "resumed": resumed,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{self, TREASURY};
    use keeper_store::log::AppendLog;
    use keeper_types::{Address, ErrorClass, SECS_PER_WEEK};

    #[tokio::test]
    async fn test_dry_run_moves_nothing() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let mut keeper = testing::keeper(tmp.path());
        keeper.ledger.set_balance(TREASURY, 999);

        let report = run(&mut keeper, 0, true).await.expect("dry run");
        assert_eq!(report.outcome, Outcome::Planned);
        assert_eq!(report.detail["plan"]["remainder"], "1");
        assert_eq!(report.detail["plan"]["allocations"][0]["amount"], "499");
        assert!(keeper.ledger.transfers().is_empty());
        assert!(keeper.store.payouts.entries().expect("entries").is_empty());
    }

    #[tokio::test]
    async fn test_completed_run_records_payouts() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let mut keeper = testing::keeper(tmp.path());
        keeper.ledger.set_balance(TREASURY, 1_000);

        let report = run(&mut keeper, 0, false).await.expect("distribute");
        assert_eq!(report.outcome, Outcome::Completed);
        let records = keeper.store.payouts.entries().expect("entries");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].amount, "5.00");
        assert_eq!(keeper.ledger.balance(&Address::new([0x44; 20])), 500);
    }

    #[tokio::test]
    async fn test_revert_reports_partial() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let mut keeper = testing::keeper(tmp.path());
        keeper.ledger.set_balance(TREASURY, 1_000);
        keeper.ledger.revert_transfer_at(2);

        let failure = run(&mut keeper, 0, false).await.expect_err("partial");
        let report = RunReport::failed(COMMAND, failure);
        assert_eq!(report.outcome, Outcome::Partial);
        assert_eq!(report.error_class, Some(ErrorClass::TransactionFailure));
        assert_eq!(report.exit_code(), 4);
        assert_eq!(report.detail["paid"].as_array().map(Vec::len), Some(1));
        assert_eq!(report.detail["unpaid"][0]["label"], "dev");
    }

    #[tokio::test]
    async fn test_guarded_rerun_resumes() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let mut keeper = testing::keeper(tmp.path());
        keeper.epoch_guard = true;
        keeper.ledger.set_balance(TREASURY, 1_000);
        keeper.ledger.revert_transfer_at(2);
        let now = 100 * SECS_PER_WEEK + 5;

        run(&mut keeper, now, false).await.expect_err("partial");
        let report = run(&mut keeper, now, false).await.expect("resume");
        assert_eq!(report.detail["resumed"], true);
        assert_eq!(report.detail["report"]["epoch"], 100);

        let records = keeper.store.payouts.entries().expect("entries");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.epoch == Some(100)));
        assert_eq!(keeper.ledger.balance(&TREASURY), 0);

        // Same epoch again: nothing left to pay.
        run(&mut keeper, now + 60, false).await.expect("noop");
        assert_eq!(keeper.ledger.transfers().len(), 2);
    }
}
