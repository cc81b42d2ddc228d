//! Integration test crate for the treasury keeper.
//!
//! This crate has no library code; it only contains integration tests
//! that drive the APR Controller and the Distribution Engine end to end
//! against the in-memory ledger and a temporary data directory.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p keeper-integration-tests
//! ```
