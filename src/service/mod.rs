//! Stateless services over the repositories: rate locking, fraud risk,
//! validation quorum, the order lifecycle and the task scheduler.

pub mod lifecycle;
pub mod quorum;
pub mod rate;
pub mod risk;
pub mod scheduler;

pub use lifecycle::{CreateOrderRequest, OrderLifecycle};
pub use quorum::ValidationQuorum;
pub use rate::{HttpPriceOracle, PriceOracle, RateLockService};
pub use risk::FraudRiskEngine;
pub use scheduler::Scheduler;
