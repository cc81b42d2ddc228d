//! Command handlers.
//!
//! Each submodule implements one `keeper` subcommand over a [`Keeper`]
//! context. Handlers are generic over the [`Ledger`] so they run unchanged
//! against the in-memory ledger in tests.

pub mod adjustment;
pub mod distribution;
pub mod scheduler;
pub mod status;

use keeper_apr::policy::AprPolicy;
use keeper_ledger::rpc::Contracts;
use keeper_ledger::Ledger;
use keeper_payout::table::RoleTable;
use keeper_store::Store;
use keeper_types::{Address, RoleId};

use crate::config::{ConfigError, KeeperConfig, ScheduleConfig};
use crate::report::Failure;

type Result = std::result::Result<crate::report::RunReport, Failure>;

/// Everything a command needs, validated up front.
pub struct Keeper<L> {
    /// External ledger.
    pub ledger: L,
    /// Local files.
    pub store: Store,
    /// APR policy.
    pub policy: AprPolicy,
    /// Payout table.
    pub table: RoleTable,
    /// Contract addresses.
    pub contracts: Contracts,
    /// Token decimals.
    pub decimals: u8,
    /// Whether distribution runs are guarded per epoch.
    pub epoch_guard: bool,
    /// Role the signer needs for adjustments.
    pub adjuster_role: Option<RoleId>,
    /// Address the gateway signs with.
    pub signer: Option<Address>,
    /// Scheduler cadence.
    pub schedule: ScheduleConfig,
    /// Cooldown length, used as the default retry delay.
    pub adjustment_period_secs: u64,
}

impl<L: Ledger> Keeper<L> {
    /// Validate `config` and assemble a context over `ledger` and `store`.
    ///
    /// All configuration errors surface here, before any ledger call.
    pub fn new(
        config: &KeeperConfig,
        contracts: Contracts,
        ledger: L,
        store: Store,
    ) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            policy: config.policy()?,
            table: config.role_table()?,
            contracts,
            decimals: config.distribution.token_decimals,
            epoch_guard: config.distribution.epoch_guard,
            adjuster_role: config.apr.adjuster_role,
            signer: config.network.signer,
            schedule: config.schedule.clone(),
            adjustment_period_secs: config.apr.adjustment_period_secs,
            ledger,
            store,
        })
    }

    /// Delay before retrying a failed adjustment.
    pub fn retry_after_secs(&self) -> u64 {
        self.schedule
            .retry_after_secs
            .unwrap_or(self.adjustment_period_secs)
    }
}
