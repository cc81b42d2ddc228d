//! Validated role table and distribution plans.
//!
//! ## Rounding
//!
//! ```text
//! amount_i  = floor(balance * share_bps_i / 10000)
//! remainder = balance - sum(amount_i)        (0 <= remainder < roles)
//! ```
//!
//! The remainder is not paid to anyone; it stays in the treasury.

use serde::Serialize;

use keeper_types::units::amount_str;
use keeper_types::{Address, WalletRole, BPS_DENOMINATOR};

use crate::{PayoutError, Result};

/// Check that a role set is usable for distribution.
///
/// # Errors
///
/// - [`PayoutError::EmptyTable`] if there are no roles
/// - [`PayoutError::ZeroShare`] / [`PayoutError::ZeroAddress`] for a
///   degenerate entry
/// - [`PayoutError::InvalidShareTotal`] unless shares sum to exactly 10000
pub fn validate_shares(roles: &[WalletRole]) -> Result<()> {
    if roles.is_empty() {
        return Err(PayoutError::EmptyTable);
    }
    if let Some(role) = roles.iter().find(|r| r.share_bps == 0) {
        return Err(PayoutError::ZeroShare {
            label: role.label.clone(),
        });
    }
    if let Some(role) = roles.iter().find(|r| r.address.is_zero()) {
        return Err(PayoutError::ZeroAddress {
            label: role.label.clone(),
        });
    }
    let total: u64 = roles.iter().map(|r| u64::from(r.share_bps)).sum();
    if total != u64::from(BPS_DENOMINATOR) {
        return Err(PayoutError::InvalidShareTotal { total });
    }
    Ok(())
}

/// `floor(balance * share_bps / 10000)` without intermediate overflow.
pub fn share_of(balance: u128, share_bps: u32) -> u128 {
    let denom = u128::from(BPS_DENOMINATOR);
    let share = u128::from(share_bps);
    (balance / denom) * share + (balance % denom) * share / denom
}

/// One role's slice of a distribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Allocation {
    /// Position in the role table.
    pub index: usize,
    /// Role label.
    pub label: String,
    /// Recipient.
    pub address: Address,
    /// Share in basis points.
    pub share_bps: u32,
    /// Amount in minor units.
    #[serde(with = "amount_str")]
    pub amount: u128,
}

/// Per-role amounts for one balance snapshot, in table order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DistributionPlan {
    /// Balance the plan was computed from.
    #[serde(with = "amount_str")]
    pub balance: u128,
    /// Allocations in table order.
    pub allocations: Vec<Allocation>,
    /// Amount left undistributed in the treasury.
    #[serde(with = "amount_str")]
    pub remainder: u128,
}

impl DistributionPlan {
    /// Sum of all allocations.
    pub fn total(&self) -> u128 {
        self.allocations.iter().map(|a| a.amount).sum()
    }
}

/// A role table whose shares are known to sum to 10000.
///
/// The table is fixed for the life of the process; construct it once from
/// configuration and hand it to the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleTable {
    roles: Vec<WalletRole>,
}

impl RoleTable {
    /// Validate and wrap a role set.
    ///
    /// # Errors
    ///
    /// See [`validate_shares`].
    pub fn new(roles: Vec<WalletRole>) -> Result<Self> {
        validate_shares(&roles)?;
        Ok(Self { roles })
    }

    /// Roles in configuration order.
    pub fn roles(&self) -> &[WalletRole] {
        &self.roles
    }

    /// Number of roles.
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Always `false` for a validated table.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Compute the allocations for `balance`.
    pub fn plan(&self, balance: u128) -> DistributionPlan {
        let allocations: Vec<Allocation> = self
            .roles
            .iter()
            .enumerate()
            .map(|(index, role)| Allocation {
                index,
                label: role.label.clone(),
                address: role.address,
                share_bps: role.share_bps,
                amount: share_of(balance, role.share_bps),
            })
            .collect();
        let distributed: u128 = allocations.iter().map(|a| a.amount).sum();
        DistributionPlan {
            balance,
            allocations,
            remainder: balance - distributed,
        }
    }
}

/// Validate `roles` and plan `balance` over them in one step.
pub fn plan(balance: u128, roles: &[WalletRole]) -> Result<DistributionPlan> {
    Ok(RoleTable::new(roles.to_vec())?.plan(balance))
}
