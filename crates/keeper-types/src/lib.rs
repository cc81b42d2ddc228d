//! # keeper-types
//!
//! Shared domain types used across the keeper workspace: addresses, the
//! vault and APR snapshots read from the external ledger, the static
//! wallet/role table entries, and the immutable audit records written after
//! each confirmed ledger update.

pub mod address;
pub mod class;
pub mod records;
pub mod state;
pub mod units;

pub use address::{Address, RoleId, TxHash};
pub use class::ErrorClass;
pub use records::{AdjustmentRecord, DeploymentRecord, PayoutRecord, TxReceipt, TxStatus};
pub use state::{AprState, VaultState, WalletRole};

/// Basis-point denominator: 10000 = 100%.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Maximum representable APR in basis points.
pub const MAX_APR_BPS: u32 = BPS_DENOMINATOR;

/// Seconds in one day; the default APR adjustment period.
pub const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Seconds in one week; the distribution cadence.
pub const SECS_PER_WEEK: u64 = 7 * SECS_PER_DAY;

/// Error types for parsing and converting domain values.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// Address is not a `0x`-prefixed 20-byte hex string.
    #[error("invalid address {value:?}: {reason}")]
    InvalidAddress {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Role identifier is not a `0x`-prefixed 32-byte hex string.
    #[error("invalid role id {0:?}")]
    InvalidRoleId(String),

    /// Token amount string could not be parsed.
    #[error("invalid token amount {value:?}: {reason}")]
    InvalidAmount {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Token decimals outside the supported range.
    #[error("unsupported token decimals {0} (max {max})", max = units::MAX_DECIMALS)]
    UnsupportedDecimals(u8),
}

/// Convenience result type for domain conversions.
pub type Result<T> = std::result::Result<T, TypesError>;

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}
