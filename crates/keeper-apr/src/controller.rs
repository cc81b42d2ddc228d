//! The APR adjustment decision and the controller that commits it.
//!
//! ```text
//!   Cooldown ──(now >= nextAdjustmentTime)──▶ Eligible ──commit──▶ Adjusting
//!      │                                                              │
//!      ▼                                                              ▼
//!  Rejected(CooldownActive)                                  Committed(newAPR)
//! ```
//!
//! The phase is always derived from freshly read ledger state; nothing is
//! persisted locally between runs except the audit record of a commit.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use keeper_ledger::vault::VaultReader;
use keeper_ledger::{AprUpdate, Ledger};
use keeper_store::log::AppendLog;
use keeper_types::{AdjustmentRecord, AprState, VaultState};

use crate::policy::AprPolicy;
use crate::{AprError, Result};

/// Controller phase for one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// `now < nextAdjustmentTime`.
    Cooldown,
    /// `now >= nextAdjustmentTime`.
    Eligible,
    /// Commit submitted and awaiting confirmation.
    Adjusting,
}

impl Phase {
    /// Phase implied by `state` at `now`.
    pub fn of(state: &AprState, now: u64) -> Self {
        if state.is_eligible(now) {
            Self::Eligible
        } else {
            Self::Cooldown
        }
    }
}

/// A computed, not yet committed, rate change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Adjustment {
    /// Rate before the change.
    pub previous_apr_bps: u32,
    /// Tier target before clamping.
    pub raw_apr_bps: u32,
    /// Clamped rate to commit.
    pub new_apr_bps: u32,
    /// Cooldown end to commit alongside the rate.
    pub next_adjustment_time: u64,
}

impl Adjustment {
    /// Whether clamping changed the tier target.
    pub fn clamped(&self) -> bool {
        self.raw_apr_bps != self.new_apr_bps
    }

    /// The ledger update for this adjustment.
    pub fn update(&self) -> AprUpdate {
        AprUpdate {
            new_apr_bps: self.new_apr_bps,
            next_adjustment_time: self.next_adjustment_time,
        }
    }
}

/// Decide the adjustment for `vault` at `now`.
///
/// Pure: it neither reads nor writes anything.
///
/// # Errors
///
/// - [`AprError::CooldownActive`] if `now < state.next_adjustment_time`
pub fn adjust(
    policy: &AprPolicy,
    now: u64,
    vault: &VaultState,
    state: &AprState,
) -> Result<Adjustment> {
    if !state.is_eligible(now) {
        return Err(AprError::CooldownActive {
            remaining_secs: state.cooldown_remaining(now),
            next_adjustment_time: state.next_adjustment_time,
        });
    }

    let raw_apr_bps = policy.target_rate(vault.total_deposited);
    let new_apr_bps = state.clamp(raw_apr_bps);
    let next_adjustment_time = now.saturating_add(policy.adjustment_period_secs());

    Ok(Adjustment {
        previous_apr_bps: state.current_apr_bps,
        raw_apr_bps,
        new_apr_bps,
        next_adjustment_time,
    })
}

/// Reads vault state, decides, commits through the ledger and records the
/// adjustment.
pub struct AprController<'a, L, S> {
    ledger: &'a L,
    policy: &'a AprPolicy,
    records: &'a mut S,
}

impl<'a, L, S> AprController<'a, L, S>
where
    L: Ledger,
    S: AppendLog<AdjustmentRecord>,
{
    /// Create a controller.
    pub fn new(ledger: &'a L, policy: &'a AprPolicy, records: &'a mut S) -> Self {
        Self {
            ledger,
            policy,
            records,
        }
    }

    /// Read fresh state and report the decision without committing.
    pub async fn preview(&self, now: u64) -> Result<(AprState, VaultState, Result<Adjustment>)> {
        let snapshot = VaultReader::new(self.ledger).read(now).await?;
        let state = self
            .policy
            .apr_state(snapshot.current_apr_bps, snapshot.next_adjustment_time);
        let decision = adjust(self.policy, now, &snapshot.vault, &state);
        Ok((state, snapshot.vault, decision))
    }

    /// Run one adjustment at `now`.
    ///
    /// # Errors
    ///
    /// - [`AprError::CooldownActive`] if the ledger's cooldown has not ended
    /// - [`AprError::Ledger`] if reading or committing fails; the ledger's
    ///   rate is unchanged and no record is written
    /// - [`AprError::Record`] if the commit succeeded but the audit record
    ///   could not be appended
    pub async fn run(&mut self, now: u64) -> Result<AdjustmentRecord> {
        let (state, vault, decision) = self.preview(now).await?;
        if state.current_apr_bps < state.min_apr_bps || state.current_apr_bps > state.max_apr_bps {
            warn!(
                current = state.current_apr_bps,
                min = state.min_apr_bps,
                max = state.max_apr_bps,
                "ledger rate outside policy bounds"
            );
        }

        let adjustment = match decision {
            Ok(adjustment) => adjustment,
            Err(e) => {
                info!(
                    phase = ?Phase::of(&state, now),
                    remaining_secs = state.cooldown_remaining(now),
                    "APR adjustment rejected: cooldown active"
                );
                return Err(e);
            }
        };

        if adjustment.clamped() {
            info!(
                raw = adjustment.raw_apr_bps,
                clamped = adjustment.new_apr_bps,
                min = state.min_apr_bps,
                max = state.max_apr_bps,
                "tier target clamped into bounds"
            );
        }
        if adjustment.new_apr_bps == adjustment.previous_apr_bps {
            info!(apr = adjustment.new_apr_bps, "APR unchanged, committing to advance cooldown");
        }

        info!(
            phase = ?Phase::Adjusting,
            previous = adjustment.previous_apr_bps,
            new = adjustment.new_apr_bps,
            total_deposited = %vault.total_deposited,
            next_adjustment_time = adjustment.next_adjustment_time,
            "committing APR adjustment"
        );
        let receipt = self.ledger.adjust_apr(&adjustment.update()).await?;

        let record = AdjustmentRecord {
            previous_apr: adjustment.previous_apr_bps,
            new_apr: adjustment.new_apr_bps,
            timestamp: Utc::now(),
            triggering_deposit: vault.total_deposited,
            next_adjustment_time: adjustment.next_adjustment_time,
            tx_hash: receipt.tx_hash.clone(),
        };
        self.records
            .append(&record)
            .map_err(|source| AprError::Record {
                tx_hash: receipt.tx_hash.clone(),
                source,
            })?;

        info!(
            previous = record.previous_apr,
            new = record.new_apr,
            tx_hash = %record.tx_hash,
            "APR adjustment committed"
        );
        Ok(record)
    }
}
