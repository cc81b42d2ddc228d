//! Epoch guard journal.
//!
//! When the guard is on, a distribution run records its epoch and the
//! balance snapshot it planned from before the first transfer. A later run
//! in the same epoch reuses that snapshot so the per-role amounts match and
//! roles already in the payout ledger for the epoch can be skipped.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keeper_types::units::amount_str;
use keeper_types::SECS_PER_WEEK;

use crate::log::{AppendLog, JsonLog};
use crate::Result;

/// Distribution epoch containing `now` (weeks since the Unix epoch).
pub fn epoch_of(now: u64) -> u64 {
    now / SECS_PER_WEEK
}

/// A distribution epoch that has been started.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochEntry {
    /// Epoch number.
    pub epoch: u64,
    /// Treasury balance the epoch's plan was computed from.
    #[serde(with = "amount_str")]
    pub balance_snapshot: u128,
    /// When the first run of the epoch started.
    pub started_at: DateTime<Utc>,
}

/// Journal of started epochs, backed by `epochs.json`.
#[derive(Debug)]
pub struct EpochJournal {
    log: JsonLog<EpochEntry>,
}

impl EpochJournal {
    /// Journal backed by `path`.
    pub fn new(path: PathBuf) -> Self {
        Self {
            log: JsonLog::new(path),
        }
    }

    /// The entry for `epoch`, if it was started.
    pub fn find(&self, epoch: u64) -> Result<Option<EpochEntry>> {
        Ok(self.log.entries()?.into_iter().find(|e| e.epoch == epoch))
    }

    /// Record the start of an epoch.
    pub fn begin(&mut self, entry: &EpochEntry) -> Result<()> {
        tracing::info!(
            epoch = entry.epoch,
            balance_snapshot = %entry.balance_snapshot,
            "distribution epoch started"
        );
        self.log.append(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_of() {
        assert_eq!(epoch_of(0), 0);
        assert_eq!(epoch_of(SECS_PER_WEEK - 1), 0);
        assert_eq!(epoch_of(SECS_PER_WEEK), 1);
    }

    #[test]
    fn test_begin_and_find() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let mut journal = EpochJournal::new(tmp.path().join("epochs.json"));
        assert!(journal.find(2900).expect("find").is_none());

        let entry = EpochEntry {
            epoch: 2900,
            balance_snapshot: 1_000,
            started_at: Utc::now(),
        };
        journal.begin(&entry).expect("begin");
        assert_eq!(journal.find(2900).expect("find"), Some(entry));
        assert!(journal.find(2901).expect("find").is_none());
    }
}
