//! # keeper-store
//!
//! Local persistence for the keeper. Everything is a JSON file under the
//! data directory so that dashboards and operators can read it directly:
//!
//! - `payouts.json` — the Payout Ledger, an append-only array of
//!   [`PayoutRecord`](keeper_types::PayoutRecord)s
//! - `adjustments.json` — append-only array of
//!   [`AdjustmentRecord`](keeper_types::AdjustmentRecord)s
//! - `epochs.json` — distribution epochs started under the epoch guard
//!
//! Deployment records written by the setup scripts are read through
//! [`deployments`].
//!
//! ## Modules
//!
//! - [`log`] — append-only JSON array files
//! - [`epochs`] — epoch guard journal
//! - [`deployments`] — deployment record loading

pub mod deployments;
pub mod epochs;
pub mod log;

use std::path::{Path, PathBuf};

use keeper_types::{AdjustmentRecord, ErrorClass, PayoutRecord};

use crate::epochs::EpochJournal;
use crate::log::JsonLog;

/// Payout Ledger file name.
pub const PAYOUTS_FILE: &str = "payouts.json";

/// Adjustment log file name.
pub const ADJUSTMENTS_FILE: &str = "adjustments.json";

/// Epoch journal file name.
pub const EPOCHS_FILE: &str = "epochs.json";

/// Error types for local persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("{op} {path}: {source}")]
    Io {
        /// What was being done.
        op: &'static str,
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// File content is not the expected JSON.
    #[error("corrupt {path}: {detail}")]
    Corrupt {
        /// File involved.
        path: PathBuf,
        /// Parse error detail.
        detail: String,
    },

    /// A deployment record belongs to another network.
    #[error("deployment {path} is for network {found:?}, expected {expected:?}")]
    NetworkMismatch {
        /// Record file.
        path: PathBuf,
        /// Configured network.
        expected: String,
        /// Network in the record.
        found: String,
    },
}

impl StoreError {
    pub(crate) fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Operator-facing class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NetworkMismatch { .. } => ErrorClass::Configuration,
            Self::Io { .. } | Self::Corrupt { .. } => ErrorClass::Storage,
        }
    }
}

/// Convenience result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// The keeper's files under one data directory.
#[derive(Debug)]
pub struct Store {
    /// Payout Ledger.
    pub payouts: JsonLog<PayoutRecord>,
    /// Adjustment audit log.
    pub adjustments: JsonLog<AdjustmentRecord>,
    /// Epoch guard journal.
    pub epochs: EpochJournal,
}

impl Store {
    /// Open (creating if needed) the data directory.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| StoreError::io("create dir", data_dir, e))?;
        tracing::debug!(dir = %data_dir.display(), "store opened");
        Ok(Self {
            payouts: JsonLog::new(data_dir.join(PAYOUTS_FILE)),
            adjustments: JsonLog::new(data_dir.join(ADJUSTMENTS_FILE)),
            epochs: EpochJournal::new(data_dir.join(EPOCHS_FILE)),
        })
    }
}
