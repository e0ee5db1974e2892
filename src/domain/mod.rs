//! Core domain types: orders, validation tasks, validator standing,
//! risk assessments and rate locks.
//!
//! Entities here are plain serializable records. They never hold live
//! references to each other; cross-entity relations are by identifier
//! lookup through the repositories, so every entity stays independently
//! serializable and cacheable.

pub mod id;
pub mod money;
pub mod order;
pub mod rate;
pub mod risk;
pub mod validation;
pub mod validator;

pub use id::{OrderId, SolverId, TaskId, WalletAddress};
pub use money::TokenAmount;
pub use order::{Direction, Order, OrderStatus, SettlementOutcome};
pub use rate::{LockedRate, RateQuote, RateSource};
pub use risk::{DeviceSignals, RequiredAction, RiskAssessment, RiskLevel, UserHistory};
pub use validation::{EvidenceBundle, TaskStatus, ValidationTask, ValidationVote, VoteDecision};
pub use validator::{StakeLock, ValidatorProfile};
