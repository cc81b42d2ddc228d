//! Deployment records written by the contract setup scripts.
//!
//! Format: `{ "address": "0x…", "network": "…", "timestamp": "<ISO-8601>" }`.

use std::path::Path;

use keeper_types::DeploymentRecord;

use crate::{Result, StoreError};

/// Load a deployment record and check it belongs to `network`.
///
/// # Errors
///
/// - [`StoreError::Io`] if the file cannot be read
/// - [`StoreError::Corrupt`] if it is not a deployment record
/// - [`StoreError::NetworkMismatch`] if it was deployed elsewhere
pub fn load(path: &Path, network: &str) -> Result<DeploymentRecord> {
    let content = std::fs::read_to_string(path).map_err(|e| StoreError::io("read", path, e))?;
    let record: DeploymentRecord =
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    if record.network != network {
        return Err(StoreError::NetworkMismatch {
            path: path.to_path_buf(),
            expected: network.to_string(),
            found: record.network,
        });
    }
    tracing::debug!(
        path = %path.display(),
        address = %record.address,
        deployed_at = %record.timestamp,
        "deployment record loaded"
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"{
        "address": "0x52908400098527886e0f7030069857d2e4169ee7",
        "network": "sepolia",
        "timestamp": "2025-11-02T14:03:11.512Z"
    }"#;

    #[test]
    fn test_load_matching_network() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let path = tmp.path().join("vault.json");
        std::fs::write(&path, RECORD).expect("write");
        let record = load(&path, "sepolia").expect("load");
        assert_eq!(
            record.address.to_string(),
            "0x52908400098527886e0f7030069857d2e4169ee7"
        );
    }

    #[test]
    fn test_load_network_mismatch() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let path = tmp.path().join("vault.json");
        std::fs::write(&path, RECORD).expect("write");
        let err = load(&path, "mainnet").expect_err("mismatch");
        assert!(matches!(err, StoreError::NetworkMismatch { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let err = load(&tmp.path().join("absent.json"), "mainnet").expect_err("missing");
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_load_bad_address() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let path = tmp.path().join("vault.json");
        std::fs::write(
            &path,
            r#"{"address":"0x12","network":"mainnet","timestamp":"2025-11-02T14:03:11Z"}"#,
        )
        .expect("write");
        assert!(matches!(load(&path, "mainnet"), Err(StoreError::Corrupt { .. })));
    }
}
