//! `run-scheduler`: fire adjustments and distributions on their cadences.
//!
//! Single-threaded: one job runs at a time and the loop sleeps until the
//! next one is due. A failed job is logged and retried on its next fire;
//! the scheduler itself never stops on a job failure, only on Ctrl-C.

use std::time::Duration;

use serde_json::json;
use tracing::{error, info, warn};

use keeper_apr::AprError;
use keeper_ledger::Ledger;
use keeper_types::unix_now;

use super::{adjustment, distribution, Keeper, Result};
use crate::report::{Outcome, RunReport};
use crate::schedule::{next_distribution_time, rfc3339, seconds_until, Cadence, Job};

/// Command name for reports.
pub const COMMAND: &str = "run-scheduler";

/// First cadence, with the adjustment fire taken from the ledger's cooldown.
pub async fn initial_cadence<L: Ledger>(keeper: &Keeper<L>, now: u64) -> Cadence {
    let next_adjustment = match keeper.ledger.apr_info().await {
        Ok(info) => info.next_adjustment_time.max(now),
        Err(e) => {
            warn!(error = %e, "reading cooldown failed, adjustment deferred");
            now.saturating_add(keeper.retry_after_secs())
        }
    };
    Cadence {
        next_adjustment,
        next_distribution: next_distribution_time(
            now,
            keeper.schedule.distribution_weekday,
            keeper.schedule.distribution_hour_utc,
        ),
    }
}

/// Fire `job` at `now` and return its report and the following cadence.
pub async fn fire<L: Ledger>(
    keeper: &mut Keeper<L>,
    job: Job,
    now: u64,
    cadence: Cadence,
) -> (RunReport, Cadence) {
    match job {
        Job::Adjustment => {
            let (report, next_adjustment) = match adjustment::commit(keeper, now).await {
                Ok(record) => (adjustment::committed(&record), record.next_adjustment_time),
                Err(e) => {
                    let next = match &e {
                        AprError::CooldownActive {
                            next_adjustment_time,
                            ..
                        } => *next_adjustment_time,
                        _ => now.saturating_add(keeper.retry_after_secs()),
                    };
                    (RunReport::failed(adjustment::COMMAND, e.into()), next)
                }
            };
            (
                report,
                Cadence {
                    next_adjustment,
                    ..cadence
                },
            )
        }
        Job::Distribution => {
            let report = distribution::run(keeper, now, false)
                .await
                .unwrap_or_else(|f| RunReport::failed(distribution::COMMAND, f));
            let next_distribution = next_distribution_time(
                now,
                keeper.schedule.distribution_weekday,
                keeper.schedule.distribution_hour_utc,
            );
            (
                report,
                Cadence {
                    next_distribution,
                    ..cadence
                },
            )
        }
    }
}

/// Run until Ctrl-C.
pub async fn run<L: Ledger>(keeper: &mut Keeper<L>) -> Result {
    let mut cadence = initial_cadence(keeper, unix_now()).await;
    let mut fired = 0u64;
    let mut failed = 0u64;
    info!(
        next_adjustment_at = %rfc3339(cadence.next_adjustment),
        next_distribution_at = %rfc3339(cadence.next_distribution),
        "scheduler started"
    );

    loop {
        let (job, at) = cadence.next();
        let wait = seconds_until(unix_now(), at);
        info!(?job, at = %rfc3339(at), wait_secs = wait, "next job scheduled");

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(wait)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, scheduler stopping");
                break;
            }
        }

        let (report, next) = fire(keeper, job, unix_now(), cadence).await;
        cadence = next;
        fired += 1;
        match report.exit_code() {
            0 => info!(?job, outcome = ?report.outcome, "job finished"),
            code => {
                failed += 1;
                error!(
                    ?job,
                    outcome = ?report.outcome,
                    exit_code = code,
                    error = report.message.as_deref().unwrap_or_default(),
                    "job failed"
                );
            }
        }
        // One line per fire, same shape as the one-shot commands.
        if let Ok(line) = serde_json::to_string(&report) {
            println!("{line}");
        }
    }

    Ok(RunReport::ok(
        COMMAND,
        Outcome::Stopped,
        json!({
            "fired": fired,
            "failed": failed,
            "cadence": cadence,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{self, TREASURY};
    use keeper_ledger::AprInfo;
    use keeper_types::SECS_PER_DAY;

    #[tokio::test]
    async fn test_initial_cadence_from_ledger() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let keeper = testing::keeper(tmp.path());
        keeper.ledger.set_apr_info(AprInfo {
            current_apr_bps: 2000,
            next_adjustment_time: 5_000,
            total_deposited: 0,
        });
        let cadence = initial_cadence(&keeper, 1_000).await;
        assert_eq!(cadence.next_adjustment, 5_000);

        let cadence = initial_cadence(&keeper, 9_000).await;
        assert_eq!(cadence.next_adjustment, 9_000);
    }

    #[tokio::test]
    async fn test_initial_cadence_when_unreachable() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let keeper = testing::keeper(tmp.path());
        keeper.ledger.set_unreachable(true);
        let cadence = initial_cadence(&keeper, 1_000).await;
        assert_eq!(cadence.next_adjustment, 1_000 + SECS_PER_DAY);
    }

    #[tokio::test]
    async fn test_adjustment_fire_advances_to_ledger_cooldown() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let mut keeper = testing::keeper(tmp.path());
        keeper.ledger.set_apr_info(AprInfo {
            current_apr_bps: 2000,
            next_adjustment_time: 0,
            total_deposited: 0,
        });
        let cadence = initial_cadence(&keeper, 10).await;

        let (report, cadence) = fire(&mut keeper, Job::Adjustment, 10, cadence).await;
        assert_eq!(report.outcome, Outcome::Committed);
        assert_eq!(cadence.next_adjustment, 10 + SECS_PER_DAY);

        // Fired early (e.g. clock skew): rejected, rescheduled to the cooldown end.
        let (report, cadence) = fire(&mut keeper, Job::Adjustment, 20, cadence).await;
        assert_eq!(report.outcome, Outcome::Rejected);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(cadence.next_adjustment, 10 + SECS_PER_DAY);
    }

    #[tokio::test]
    async fn test_failed_adjustment_retried_later() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let mut keeper = testing::keeper(tmp.path());
        keeper.schedule.retry_after_secs = Some(300);
        keeper.ledger.reject_adjustment("paused");
        let cadence = initial_cadence(&keeper, 0).await;

        let (report, cadence) = fire(&mut keeper, Job::Adjustment, 0, cadence).await;
        assert_eq!(report.exit_code(), 4);
        assert_eq!(cadence.next_adjustment, 300);
    }

    #[tokio::test]
    async fn test_distribution_fire_moves_to_next_week() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let mut keeper = testing::keeper(tmp.path());
        keeper.ledger.set_balance(TREASURY, 1_000);
        let now = 1_767_571_200; // Monday 00:00 UTC
        let cadence = initial_cadence(&keeper, now - 1).await;
        assert_eq!(cadence.next_distribution, now);

        let (report, next) = fire(&mut keeper, Job::Distribution, now, cadence).await;
        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(next.next_distribution, now + 7 * SECS_PER_DAY);
        assert_eq!(next.next_adjustment, cadence.next_adjustment);
        assert_eq!(keeper.ledger.transfers().len(), 2);
    }
}
