//! Rampline, an off-chain coordination core for stablecoin to fiat ramps.
//!
//! Requesters post orders to swap stablecoin for local fiat, solvers pick
//! them up over a push stream, and a staked validator quorum signs off on
//! payment proofs before settlement. Everything on-chain (escrow, token
//! transfers) lives elsewhere; this crate owns the order lifecycle and
//! the trust machinery around it.
//!
//! # Modules
//!
//! - [`config`] - TOML configuration with env overrides for secrets
//! - [`domain`] - Orders, quotes, validation tasks, risk primitives
//! - [`store`] - Keyed-store capability with memory and REST backends
//! - [`repository`] - Versioned persistence over the keyed store
//! - [`service`] - Lifecycle, quorum, risk, rate-lock, and scheduling
//! - [`notify`] - Solver push hub and announcement reconciliation
//! - [`api`] - Axum HTTP surface and the SSE stream
//! - [`app`] - Process assembly and background task wiring
//! - [`error`] - Error types for the crate

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod repository;
pub mod service;
pub mod store;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use error::{Error, Result};
