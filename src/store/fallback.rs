//! Availability wrapper around the replicated store.
//!
//! Any primary failure is logged and the call degrades to the in-process
//! [`MemoryStore`], never surfacing as an error to the caller. Matching
//! availability matters more here than strict cross-instance consistency;
//! records written during an outage live only on this instance and are not
//! replayed when the primary recovers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::StoreError;

use super::{KeyedStore, MemoryStore};

/// Primary-or-memory keyed store.
pub struct FallbackStore {
    primary: Arc<dyn KeyedStore>,
    fallback: MemoryStore,
}

impl FallbackStore {
    #[must_use]
    pub fn new(primary: Arc<dyn KeyedStore>) -> Self {
        Self {
            primary,
            fallback: MemoryStore::new(),
        }
    }
}

macro_rules! degrade {
    ($self:ident, $op:literal, $key:expr, $call:expr, $fallback:expr) => {
        match $call {
            Ok(value) => Ok(value),
            Err(error) => {
                warn!(op = $op, key = %$key, error = %error, "primary store failed, using fallback");
                $fallback
            }
        }
    };
}

#[async_trait]
impl KeyedStore for FallbackStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        degrade!(
            self,
            "get",
            key,
            self.primary.get(key).await,
            self.fallback.get(key).await
        )
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        degrade!(
            self,
            "set",
            key,
            self.primary.set(key, value, ttl).await,
            self.fallback.set(key, value, ttl).await
        )
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        degrade!(
            self,
            "delete",
            key,
            self.primary.delete(key).await,
            self.fallback.delete(key).await
        )
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), StoreError> {
        degrade!(
            self,
            "zadd",
            key,
            self.primary.zadd(key, score, member).await,
            self.fallback.zadd(key, score, member).await
        )
    }

    async fn zrange_recent(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        degrade!(
            self,
            "zrange",
            key,
            self.primary.zrange_recent(key, limit).await,
            self.fallback.zrange_recent(key, limit).await
        )
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        degrade!(
            self,
            "zrem",
            key,
            self.primary.zrem(key, member).await,
            self.fallback.zrem(key, member).await
        )
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        degrade!(
            self,
            "sadd",
            key,
            self.primary.sadd(key, member).await,
            self.fallback.sadd(key, member).await
        )
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        degrade!(
            self,
            "srem",
            key,
            self.primary.srem(key, member).await,
            self.fallback.srem(key, member).await
        )
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        degrade!(
            self,
            "smembers",
            key,
            self.primary.smembers(key).await,
            self.fallback.smembers(key).await
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A primary that always fails, for exercising the degradation path.
    struct BrokenStore;

    #[async_trait]
    impl KeyedStore for BrokenStore {
        async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Command("down".into()))
        }
        async fn set(&self, _: &str, _: &str, _: Option<Duration>) -> Result<(), StoreError> {
            Err(StoreError::Command("down".into()))
        }
        async fn delete(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Command("down".into()))
        }
        async fn zadd(&self, _: &str, _: f64, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Command("down".into()))
        }
        async fn zrange_recent(&self, _: &str, _: usize) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Command("down".into()))
        }
        async fn zrem(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Command("down".into()))
        }
        async fn sadd(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Command("down".into()))
        }
        async fn srem(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Command("down".into()))
        }
        async fn smembers(&self, _: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Command("down".into()))
        }
    }

    #[tokio::test]
    async fn writes_degrade_to_memory_and_remain_readable() {
        let store = FallbackStore::new(Arc::new(BrokenStore));

        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".into()));

        store.zadd("idx", 1.0, "k").await.unwrap();
        assert_eq!(store.zrange_recent("idx", 10).await.unwrap(), vec!["k".to_string()]);
    }

    #[tokio::test]
    async fn healthy_primary_is_preferred() {
        let primary = Arc::new(MemoryStore::new());
        let store = FallbackStore::new(primary.clone());

        store.set("k", "v", None).await.unwrap();
        assert_eq!(primary.get("k").await.unwrap(), Some("v".into()));
    }
}
