use thiserror::Error;

use crate::domain::order::OrderStatus;
use crate::domain::risk::RequiredAction;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Keyed-store errors. These never reach repository callers: every store
/// failure degrades to the in-process fallback (see `store::fallback`),
/// so this type mostly shows up in logs.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("store returned error: {0}")]
    Command(String),

    #[error("failed to decode stored value: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Order lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("order {order_id} not found")]
    NotFound { order_id: String },

    #[error("invalid transition for order {order_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("order creation blocked by risk engine (score {score})")]
    RiskBlocked {
        score: u8,
        required_actions: Vec<RequiredAction>,
    },
}

/// Validation quorum errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuorumError {
    #[error("validation task {task_id} not found")]
    TaskNotFound { task_id: String },

    #[error("a pending validation task already exists for order {order_id}")]
    AlreadyOpen { order_id: String },

    #[error("validator {validator} already voted on task {task_id}")]
    DuplicateVote { task_id: String, validator: String },

    #[error("task {task_id} is closed to new votes: {reason}")]
    TaskClosed { task_id: String, reason: String },

    #[error("validator {validator} is not eligible to vote: {reason}")]
    NotEligible { validator: String, reason: String },

    #[error("validator {validator} has insufficient free stake: need {needed}, have {available}")]
    InsufficientStake {
        validator: String,
        needed: u64,
        available: u64,
    },
}

/// Request-input errors, reported to the caller before any state change.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("amount {amount} outside allowed bounds [{min}, {max}]")]
    AmountOutOfBounds {
        amount: String,
        min: String,
        max: String,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Quorum(#[from] QuorumError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("stale write for {entity}: expected version {expected}, found {found}")]
    Conflict {
        entity: String,
        expected: u64,
        found: u64,
    },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
