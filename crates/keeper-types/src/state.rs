//! Snapshots read from the external ledger and the static role table entry.
//!
//! [`VaultState`] and [`AprState`] are fetched fresh on every controller run
//! and never cached across runs. [`WalletRole`] is loaded once from static
//! configuration.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::units::amount_str;

/// Total value deposited in the staking vault at a point in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    /// Total deposited, in token minor units.
    #[serde(with = "amount_str")]
    pub total_deposited: u128,
    /// Unix timestamp of the read.
    pub as_of: u64,
}

/// Reward-rate state materialized on the external ledger.
///
/// Invariant: `min_apr_bps <= current_apr_bps <= max_apr_bps` once the
/// controller has committed at least once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AprState {
    /// Current rate in basis points.
    pub current_apr_bps: u32,
    /// Unix timestamp before which no adjustment is allowed.
    pub next_adjustment_time: u64,
    /// Lower bound in basis points.
    pub min_apr_bps: u32,
    /// Upper bound in basis points.
    pub max_apr_bps: u32,
}

impl AprState {
    /// Whether an adjustment is allowed at `now`.
    pub fn is_eligible(&self, now: u64) -> bool {
        now >= self.next_adjustment_time
    }

    /// Seconds left until the cooldown expires (0 when eligible).
    pub fn cooldown_remaining(&self, now: u64) -> u64 {
        self.next_adjustment_time.saturating_sub(now)
    }

    /// Clamp a rate into this state's bounds.
    pub fn clamp(&self, apr_bps: u32) -> u32 {
        apr_bps.clamp(self.min_apr_bps, self.max_apr_bps)
    }
}

/// One entry of the static payout table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRole {
    /// Free-text role label (e.g. "marketing", "dev-fund").
    pub label: String,
    /// Payout address.
    pub address: Address,
    /// Share of each distribution in basis points.
    pub share_bps: u32,
}
