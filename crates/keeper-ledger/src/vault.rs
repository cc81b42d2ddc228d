//! Vault State Reader.
//!
//! One `getAPRInfo()` call yields both the vault total and the ledger-side
//! rate fields; they are always read together so that the controller decides
//! on a consistent snapshot.

use tracing::debug;

use keeper_types::VaultState;

use crate::ledger::Ledger;
use crate::Result;

/// Fresh read of the vault and its rate fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultSnapshot {
    /// Vault total at read time.
    pub vault: VaultState,
    /// Rate currently on the ledger, in basis points.
    pub current_apr_bps: u32,
    /// Ledger-side cooldown end.
    pub next_adjustment_time: u64,
}

/// Reads vault state from a [`Ledger`].
pub struct VaultReader<'a, L> {
    ledger: &'a L,
}

impl<'a, L: Ledger> VaultReader<'a, L> {
    /// Create a reader over `ledger`.
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    /// Read the current vault snapshot, stamping it with `now`.
    pub async fn read(&self, now: u64) -> Result<VaultSnapshot> {
        let info = self.ledger.apr_info().await?;
        debug!(
            total_deposited = %info.total_deposited,
            current_apr = info.current_apr_bps,
            next_adjustment_time = info.next_adjustment_time,
            "vault state read"
        );
        Ok(VaultSnapshot {
            vault: VaultState {
                total_deposited: info.total_deposited,
                as_of: now,
            },
            current_apr_bps: info.current_apr_bps,
            next_adjustment_time: info.next_adjustment_time,
        })
    }
}
