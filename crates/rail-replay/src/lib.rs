//! # rail-replay
//!
//! Builds a vault from a TOML config, applies a scripted sequence of
//! operations and reports the resulting event log and balances.
//!
//! ## Modules
//!
//! - [`script`] — Script format, operation dispatch and reports

pub mod script;
