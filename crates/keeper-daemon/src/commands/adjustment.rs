//! `run-adjustment`: one APR Controller run.

use serde_json::json;

use keeper_apr::controller::AprController;
use keeper_apr::AprError;
use keeper_ledger::Ledger;
use keeper_types::AdjustmentRecord;

use super::{Keeper, Result};
use crate::report::{Outcome, RunReport};
use crate::schedule::rfc3339;

/// Command name for reports.
pub const COMMAND: &str = "run-adjustment";

/// Run the controller at `now`.
///
/// A cooldown rejection comes back as `Err` with outcome `rejected`; its
/// class exits 0.
pub async fn run<L: Ledger>(keeper: &mut Keeper<L>, now: u64) -> Result {
    let record = commit(keeper, now).await?;
    Ok(committed(&record))
}

/// Run the controller and return the committed record.
pub async fn commit<L: Ledger>(
    keeper: &mut Keeper<L>,
    now: u64,
) -> std::result::Result<AdjustmentRecord, AprError> {
    AprController::new(&keeper.ledger, &keeper.policy, &mut keeper.store.adjustments)
        .run(now)
        .await
}

/// Report for a committed adjustment.
pub fn committed(record: &AdjustmentRecord) -> RunReport {
    RunReport::ok(
        COMMAND,
        Outcome::Committed,
        json!({
            "record": record,
            "unchanged": record.previous_apr == record.new_apr,
            "next_adjustment_at": rfc3339(record.next_adjustment_time),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use keeper_ledger::AprInfo;
    use keeper_store::log::AppendLog;
    use keeper_types::ErrorClass;

    #[tokio::test]
    async fn test_commit_clamps_and_records() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let mut keeper = testing::keeper(tmp.path());
        keeper.ledger.set_apr_info(AprInfo {
            current_apr_bps: 2000,
            next_adjustment_time: 1_000,
            total_deposited: 5,
        });

        let report = run(&mut keeper, 1_000).await.expect("committed");
        assert_eq!(report.outcome, Outcome::Committed);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.detail["record"]["newApr"], 3000);
        assert_eq!(keeper.ledger.apr().current_apr_bps, 3000);
        assert_eq!(keeper.ledger.apr().next_adjustment_time, 1_000 + 86_400);
        assert_eq!(keeper.store.adjustments.entries().expect("entries").len(), 1);
    }

    #[tokio::test]
    async fn test_cooldown_is_clean_rejection() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let mut keeper = testing::keeper(tmp.path());
        keeper.ledger.set_apr_info(AprInfo {
            current_apr_bps: 2000,
            next_adjustment_time: 1_000,
            total_deposited: 5,
        });

        let failure = run(&mut keeper, 400).await.expect_err("cooldown");
        let report = RunReport::failed(COMMAND, failure);
        assert_eq!(report.outcome, Outcome::Rejected);
        assert_eq!(report.error_class, Some(ErrorClass::CooldownActive));
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.detail["remaining_secs"], 600);
        assert!(keeper.ledger.adjustments().is_empty());
        assert!(keeper.store.adjustments.entries().expect("entries").is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_is_network_exit() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let mut keeper = testing::keeper(tmp.path());
        keeper.ledger.set_unreachable(true);
        let failure = run(&mut keeper, 0).await.expect_err("unreachable");
        assert_eq!(RunReport::failed(COMMAND, failure).exit_code(), 3);
    }
}
