//! APR policy: bounds, adjustment period and deposit tiers.
//!
//! The tier schedule is a monotonic step function from vault total to a
//! target rate. Thresholds are in token minor units and strictly increasing,
//! starting at zero so every deposit total maps to a tier. Rates must move in
//! one direction across tiers. A tier rate may sit outside
//! `[min_apr_bps, max_apr_bps]`; the controller clamps.

use serde::{Deserialize, Serialize};

use keeper_types::units::amount_str;
use keeper_types::{AprState, MAX_APR_BPS, SECS_PER_DAY};

use crate::{AprError, Result};

/// Default adjustment period (24 hours).
pub const DEFAULT_ADJUSTMENT_PERIOD_SECS: u64 = SECS_PER_DAY;

/// One step of the tier schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AprTier {
    /// Smallest vault total (minor units) this tier applies to.
    #[serde(with = "amount_str")]
    pub min_deposit: u128,
    /// Target rate for this tier, in basis points.
    pub apr_bps: u32,
}

/// Validated APR policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AprPolicy {
    min_apr_bps: u32,
    max_apr_bps: u32,
    adjustment_period_secs: u64,
    tiers: Vec<AprTier>,
}

impl AprPolicy {
    /// Build a policy, validating bounds and tiers.
    ///
    /// # Errors
    ///
    /// - [`AprError::InvalidBounds`] unless `min <= max <= 10000`
    /// - [`AprError::ZeroPeriod`] if the period is zero
    /// - [`AprError::InvalidTiers`] if the schedule is empty, does not start
    ///   at zero, has non-increasing thresholds, a rate above 10000, or rates
    ///   that are not monotonic
    pub fn new(
        min_apr_bps: u32,
        max_apr_bps: u32,
        adjustment_period_secs: u64,
        tiers: Vec<AprTier>,
    ) -> Result<Self> {
        if min_apr_bps > max_apr_bps || max_apr_bps > MAX_APR_BPS {
            return Err(AprError::InvalidBounds {
                min_bps: min_apr_bps,
                max_bps: max_apr_bps,
            });
        }
        if adjustment_period_secs == 0 {
            return Err(AprError::ZeroPeriod);
        }
        validate_tiers(&tiers)?;
        Ok(Self {
            min_apr_bps,
            max_apr_bps,
            adjustment_period_secs,
            tiers,
        })
    }

    /// Lower rate bound.
    pub fn min_apr_bps(&self) -> u32 {
        self.min_apr_bps
    }

    /// Upper rate bound.
    pub fn max_apr_bps(&self) -> u32 {
        self.max_apr_bps
    }

    /// Cooldown applied after each committed adjustment.
    pub fn adjustment_period_secs(&self) -> u64 {
        self.adjustment_period_secs
    }

    /// The tier schedule, ascending by threshold.
    pub fn tiers(&self) -> &[AprTier] {
        &self.tiers
    }

    /// Unclamped target rate for a vault total.
    pub fn target_rate(&self, total_deposited: u128) -> u32 {
        self.tiers
            .iter()
            .take_while(|t| t.min_deposit <= total_deposited)
            .last()
            .map_or(self.min_apr_bps, |t| t.apr_bps)
    }

    /// Combine ledger-resident rate fields with this policy's bounds.
    pub fn apr_state(&self, current_apr_bps: u32, next_adjustment_time: u64) -> AprState {
        AprState {
            current_apr_bps,
            next_adjustment_time,
            min_apr_bps: self.min_apr_bps,
            max_apr_bps: self.max_apr_bps,
        }
    }
}

fn validate_tiers(tiers: &[AprTier]) -> Result<()> {
    let first = tiers
        .first()
        .ok_or_else(|| AprError::InvalidTiers("schedule is empty".to_string()))?;
    if first.min_deposit != 0 {
        return Err(AprError::InvalidTiers(format!(
            "first tier must start at 0, starts at {}",
            first.min_deposit
        )));
    }
    if let Some(t) = tiers.iter().find(|t| t.apr_bps > MAX_APR_BPS) {
        return Err(AprError::InvalidTiers(format!(
            "tier rate {} bps exceeds {MAX_APR_BPS}",
            t.apr_bps
        )));
    }
    for pair in tiers.windows(2) {
        if pair[1].min_deposit <= pair[0].min_deposit {
            return Err(AprError::InvalidTiers(format!(
                "thresholds must strictly increase: {} then {}",
                pair[0].min_deposit, pair[1].min_deposit
            )));
        }
    }
    let non_increasing = tiers.windows(2).all(|p| p[1].apr_bps <= p[0].apr_bps);
    let non_decreasing = tiers.windows(2).all(|p| p[1].apr_bps >= p[0].apr_bps);
    if !non_increasing && !non_decreasing {
        return Err(AprError::InvalidTiers(
            "tier rates must be monotonic".to_string(),
        ));
    }
    Ok(())
}
