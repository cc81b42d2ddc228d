//! Configuration file management.
//!
//! One TOML file holds everything the keeper needs. Unlike a desktop daemon
//! there are no safe defaults for addresses or the payout table, so a
//! missing file is an error rather than a fallback to defaults.

use std::path::{Path, PathBuf};

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use keeper_apr::policy::{AprPolicy, AprTier, DEFAULT_ADJUSTMENT_PERIOD_SECS};
use keeper_apr::AprError;
use keeper_ledger::rpc::{Contracts, RpcTimeouts};
use keeper_payout::table::RoleTable;
use keeper_payout::PayoutError;
use keeper_store::StoreError;
use keeper_types::units::whole_to_units;
use keeper_types::{Address, RoleId, TypesError, WalletRole};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "KEEPER_DATA_DIR";

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "keeper.toml";

/// Configuration errors. All of them are fatal before any external call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No config file at the resolved location.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// The config file could not be read.
    #[error("reading {path}: {source}")]
    Read {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("parsing {path}: {source}")]
    Parse {
        /// Config file.
        path: PathBuf,
        /// Parse error.
        #[source]
        source: toml::de::Error,
    },

    /// A contract address is neither given inline nor by deployment record.
    #[error("contract {0:?}: set either an address or a deployment record, not both or neither")]
    Contract(&'static str),

    /// A deployment record could not be used.
    #[error("contract {contract:?}: {source}")]
    Deployment {
        /// Which contract.
        contract: &'static str,
        /// Store failure.
        #[source]
        source: StoreError,
    },

    /// APR bounds or tiers are invalid.
    #[error(transparent)]
    Policy(#[from] AprError),

    /// The payout table is invalid.
    #[error(transparent)]
    Table(#[from] PayoutError),

    /// Amount conversion failed.
    #[error(transparent)]
    Units(#[from] TypesError),

    /// Any other invalid value.
    #[error("invalid [{section}] {field}: {reason}")]
    Invalid {
        /// TOML section.
        section: &'static str,
        /// Field name.
        field: &'static str,
        /// What is wrong.
        reason: String,
    },
}

/// Complete keeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// Ledger endpoint settings.
    pub network: NetworkConfig,
    /// Contract addresses.
    pub contracts: ContractsConfig,
    /// APR policy.
    pub apr: AprConfig,
    /// Payout table.
    pub distribution: DistributionConfig,
    /// Scheduler cadence.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Ledger endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network name; deployment records must match it.
    pub name: String,
    /// JSON-RPC gateway URL.
    pub rpc_url: String,
    /// Address the gateway signs with, for the `status` role check.
    #[serde(default)]
    pub signer: Option<Address>,
    /// Bound on each HTTP exchange.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Bound on waiting for a write to be confirmed.
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    /// Receipt polling interval.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

/// Contract addresses, inline or from deployment records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Staking vault.
    #[serde(default)]
    pub vault: Option<Address>,
    /// Vault deployment record.
    #[serde(default)]
    pub vault_deployment: Option<PathBuf>,
    /// Reward token.
    #[serde(default)]
    pub token: Option<Address>,
    /// Token deployment record.
    #[serde(default)]
    pub token_deployment: Option<PathBuf>,
    /// Treasury wallet.
    #[serde(default)]
    pub treasury: Option<Address>,
    /// Treasury deployment record.
    #[serde(default)]
    pub treasury_deployment: Option<PathBuf>,
}

/// One tier as written in the config file, thresholds in whole tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// Smallest vault total, in whole tokens.
    pub min_deposit_tokens: u64,
    /// Target rate in basis points.
    pub apr_bps: u32,
}

/// APR policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AprConfig {
    /// Lower rate bound.
    pub min_bps: u32,
    /// Upper rate bound.
    pub max_bps: u32,
    /// Cooldown after each adjustment.
    #[serde(default = "default_adjustment_period")]
    pub adjustment_period_secs: u64,
    /// Deposit tier schedule.
    pub tiers: Vec<TierConfig>,
    /// Role the signer needs to adjust the rate (checked by `status`).
    #[serde(default)]
    pub adjuster_role: Option<RoleId>,
}

/// Payout table configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Token decimals.
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u8,
    /// Per-epoch rerun protection.
    #[serde(default)]
    pub epoch_guard: bool,
    /// Roles in payout order.
    pub roles: Vec<WalletRole>,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Day of the weekly distribution.
    #[serde(default = "default_weekday")]
    pub distribution_weekday: Weekday,
    /// Hour (UTC) of the weekly distribution.
    #[serde(default)]
    pub distribution_hour_utc: u32,
    /// Delay before retrying a failed adjustment. Defaults to the period.
    #[serde(default)]
    pub retry_after_secs: Option<u64>,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = `$KEEPER_DATA_DIR` or `~/.keeper`.
    #[serde(default)]
    pub data_dir: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level for keeper targets: "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions

fn default_request_timeout() -> u64 {
    30
}

fn default_confirmation_timeout() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    2_000
}

fn default_adjustment_period() -> u64 {
    DEFAULT_ADJUSTMENT_PERIOD_SECS
}

fn default_token_decimals() -> u8 {
    18
}

fn default_weekday() -> Weekday {
    Weekday::Mon
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            distribution_weekday: default_weekday(),
            distribution_hour_utc: 0,
            retry_after_secs: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl KeeperConfig {
    /// Load configuration from `path`, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map_or_else(Self::config_path, Path::to_path_buf);
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::parse(&content, base_dir).map_err(|e| match e {
            ParseFailure::Toml(source) => ConfigError::Parse { path, source },
            ParseFailure::Invalid(e) => e,
        })
    }

    /// Parse TOML content, resolving relative paths against `base_dir`.
    #[cfg(test)]
    pub(crate) fn from_toml(content: &str, base_dir: PathBuf) -> Result<Self, ConfigError> {
        Self::parse(content, base_dir).map_err(|e| match e {
            ParseFailure::Toml(source) => ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            },
            ParseFailure::Invalid(e) => e,
        })
    }

    fn parse(content: &str, base_dir: PathBuf) -> Result<Self, ParseFailure> {
        let mut config: KeeperConfig = toml::from_str(content).map_err(ParseFailure::Toml)?;
        config.base_dir = base_dir;
        config.validate().map_err(ParseFailure::Invalid)?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.network.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                section: "network",
                field: "rpc_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.network.request_timeout_secs == 0 || self.network.confirmation_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                section: "network",
                field: "timeouts",
                reason: "must be positive".to_string(),
            });
        }
        if self.schedule.distribution_hour_utc > 23 {
            return Err(ConfigError::Invalid {
                section: "schedule",
                field: "distribution_hour_utc",
                reason: format!(
                    "{} is not an hour of the day",
                    self.schedule.distribution_hour_utc
                ),
            });
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid {
                section: "logging",
                field: "level",
                reason: format!("unknown level {:?}", self.logging.level),
            });
        }
        Ok(())
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            default_data_dir()
        } else {
            self.resolve(Path::new(&self.storage.data_dir))
        }
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        default_data_dir().join(CONFIG_FILE)
    }

    /// Ledger timeouts.
    pub fn timeouts(&self) -> RpcTimeouts {
        RpcTimeouts {
            request: std::time::Duration::from_secs(self.network.request_timeout_secs),
            confirmation: std::time::Duration::from_secs(self.network.confirmation_timeout_secs),
            poll_interval: std::time::Duration::from_millis(self.network.poll_interval_ms),
        }
    }

    /// Build the validated APR policy. Tier thresholds become minor units.
    pub fn policy(&self) -> Result<AprPolicy, ConfigError> {
        let decimals = self.distribution.token_decimals;
        let tiers = self
            .apr
            .tiers
            .iter()
            .map(|t| -> Result<AprTier, TypesError> {
                Ok(AprTier {
                    min_deposit: whole_to_units(t.min_deposit_tokens, decimals)?,
                    apr_bps: t.apr_bps,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AprPolicy::new(
            self.apr.min_bps,
            self.apr.max_bps,
            self.apr.adjustment_period_secs,
            tiers,
        )?)
    }

    /// Build the validated role table.
    pub fn role_table(&self) -> Result<RoleTable, ConfigError> {
        Ok(RoleTable::new(self.distribution.roles.clone())?)
    }

    /// Resolve all contract addresses.
    pub fn contracts(&self) -> Result<Contracts, ConfigError> {
        let c = &self.contracts;
        Ok(Contracts {
            vault: self.contract("vault", c.vault, c.vault_deployment.as_deref())?,
            token: self.contract("token", c.token, c.token_deployment.as_deref())?,
            treasury: self.contract("treasury", c.treasury, c.treasury_deployment.as_deref())?,
        })
    }

    fn contract(
        &self,
        name: &'static str,
        inline: Option<Address>,
        record: Option<&Path>,
    ) -> Result<Address, ConfigError> {
        let address = match (inline, record) {
            (Some(address), None) => address,
            (None, Some(record)) => {
                keeper_store::deployments::load(&self.resolve(record), &self.network.name)
                    .map_err(|source| ConfigError::Deployment {
                        contract: name,
                        source,
                    })?
                    .address
            }
            _ => return Err(ConfigError::Contract(name)),
        };
        if address.is_zero() {
            return Err(ConfigError::Invalid {
                section: "contracts",
                field: name,
                reason: "zero address".to_string(),
            });
        }
        Ok(address)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(ConfigError),
}

/// Platform default data directory.
fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(".keeper"))
        .unwrap_or_else(|_| PathBuf::from("/tmp/keeper"))
}
