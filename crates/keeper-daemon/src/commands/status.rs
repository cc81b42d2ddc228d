//! `status`: read-only view of the vault, the treasury and the schedule.

use serde_json::json;

use keeper_apr::controller::Phase;
use keeper_ledger::vault::VaultReader;
use keeper_ledger::Ledger;
use keeper_payout::engine::DistributionEngine;

use super::{Keeper, Result};
use crate::report::{Outcome, RunReport};
use crate::schedule::{next_distribution_time, rfc3339};

/// Command name for reports.
pub const COMMAND: &str = "status";

/// Read current state at `now`. Never writes.
pub async fn run<L: Ledger>(keeper: &Keeper<L>, now: u64) -> Result {
    let snapshot = VaultReader::new(&keeper.ledger).read(now).await?;
    let state = keeper
        .policy
        .apr_state(snapshot.current_apr_bps, snapshot.next_adjustment_time);
    let target = keeper.policy.target_rate(snapshot.vault.total_deposited);

    let engine = DistributionEngine::new(
        &keeper.ledger,
        &keeper.table,
        keeper.contracts.treasury,
        keeper.decimals,
    )?;
    let balance = engine.treasury_balance().await?;
    let plan = engine.plan(balance);

    let adjuster = match (keeper.adjuster_role, keeper.signer) {
        (Some(role), Some(signer)) => Some(keeper.ledger.has_role(&role, &signer).await?),
        _ => None,
    };

    let next_distribution = next_distribution_time(
        now,
        keeper.schedule.distribution_weekday,
        keeper.schedule.distribution_hour_utc,
    );

    Ok(RunReport::ok(
        COMMAND,
        Outcome::Status,
        json!({
            "apr": {
                "phase": Phase::of(&state, now),
                "current_apr_bps": state.current_apr_bps,
                "min_apr_bps": state.min_apr_bps,
                "max_apr_bps": state.max_apr_bps,
                "next_adjustment_time": state.next_adjustment_time,
                "next_adjustment_at": rfc3339(state.next_adjustment_time),
                "cooldown_remaining_secs": state.cooldown_remaining(now),
                "total_deposited": snapshot.vault.total_deposited.to_string(),
                "tier_target_bps": target,
                "clamped_target_bps": state.clamp(target),
                "signer_has_adjuster_role": adjuster,
            },
            "treasury": {
                "address": keeper.contracts.treasury,
                "plan": plan,
            },
            "schedule": {
                "next_distribution_time": next_distribution,
                "next_distribution_at": rfc3339(next_distribution),
                "epoch_guard": keeper.epoch_guard,
            },
        }),
    ))
}
