//! Keyed-store capability: the only cross-instance state.
//!
//! Exactly two implementations exist, selected once at startup by
//! configuration: [`RestStore`] (replicated store, REST command protocol)
//! and [`MemoryStore`] (in-process map, also the degradation target).
//! Every call site depends only on the [`KeyedStore`] trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

mod fallback;
mod memory;
mod rest;

pub use fallback::FallbackStore;
pub use memory::MemoryStore;
pub use rest::RestStore;

/// Key families and TTLs for the shared store schema.
pub mod keys {
    use std::time::Duration;

    use crate::domain::{OrderId, TaskId, WalletAddress};

    pub const ORDER_INDEX: &str = "order:index";
    pub const TASK_INDEX: &str = "val:index";
    pub const VALIDATOR_INDEX: &str = "valprofile:index";
    pub const HISTORY_INDEX: &str = "fraud:index";

    pub const ORDER_TTL: Duration = Duration::from_secs(24 * 60 * 60);
    pub const TASK_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
    pub const VALIDATOR_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
    pub const HISTORY_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

    #[must_use]
    pub fn order(id: &OrderId) -> String {
        format!("order:{id}")
    }

    #[must_use]
    pub fn task(id: &TaskId) -> String {
        format!("val:{id}")
    }

    #[must_use]
    pub fn validator(addr: &WalletAddress) -> String {
        format!("valprofile:{addr}")
    }

    #[must_use]
    pub fn history(addr: &WalletAddress) -> String {
        format!("fraud:{addr}")
    }
}

/// Replicated key-value store with TTL expiry, sorted-set range queries
/// and plain sets. Values are opaque strings (JSON-encoded entities).
#[async_trait]
pub trait KeyedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a value, with an enforced expiry when `ttl` is given.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>)
        -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Add or update a member of a sorted set.
    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), StoreError>;

    /// Members ordered by descending score, capped at `limit`.
    async fn zrange_recent(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError>;

    async fn zrem(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;
}
