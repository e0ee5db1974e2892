//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`domain`]: builders for orders, histories, and validator profiles.
//! - [`oracle`]: scripted [`PriceOracle`](crate::service::rate::PriceOracle)
//!   implementations with call counting.

pub mod domain;
pub mod oracle;

pub use domain::{history_with_counts, matched_order, open_order, registered_profile};
pub use oracle::ScriptedOracle;
