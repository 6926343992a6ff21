//! Integration test crate for the Rail vault ledger.
//!
//! This crate has no library code. It only contains integration tests that
//! exercise end-to-end ledger flows across multiple workspace crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p rail-integration-tests
//! ```
