//! In-process keyed store.
//!
//! Backs single-instance runs and tests, and serves as the silent
//! degradation target when the replicated store is unreachable. State is
//! visible only to requests landing on this instance.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::StoreError;

use super::KeyedStore;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory store with lazy TTL expiry.
#[derive(Debug, Default)]
pub struct MemoryStore {
    kv: RwLock<HashMap<String, Entry>>,
    zsets: RwLock<HashMap<String, Vec<(f64, String)>>>,
    sets: RwLock<HashMap<String, HashSet<String>>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry, returning the number pruned.
    pub fn prune_expired(&self) -> usize {
        let now = Utc::now();
        let mut kv = self.kv.write();
        let before = kv.len();
        kv.retain(|_, entry| !entry.is_expired(now));
        before - kv.len()
    }
}

#[async_trait]
impl KeyedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Utc::now();
        // Expired entries read as absent; the periodic prune reclaims them.
        Ok(self
            .kv
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let expires_at = ttl.and_then(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .map(|ttl| Utc::now() + ttl)
        });
        self.kv.write().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.kv.write().remove(key);
        Ok(())
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), StoreError> {
        let mut zsets = self.zsets.write();
        let set = zsets.entry(key.to_string()).or_default();
        set.retain(|(_, m)| m != member);
        set.push((score, member.to_string()));
        Ok(())
    }

    async fn zrange_recent(&self, key: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let zsets = self.zsets.read();
        let Some(set) = zsets.get(key) else {
            return Ok(Vec::new());
        };
        let mut members = set.clone();
        members.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(members
            .into_iter()
            .take(limit)
            .map(|(_, member)| member)
            .collect())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        if let Some(set) = self.zsets.write().get_mut(key) {
            set.retain(|(_, m)| m != member);
        }
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.sets
            .write()
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError> {
        if let Some(set) = self.sets.write().get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .sets
            .read()
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_values_read_as_absent() {
        let store = MemoryStore::new();
        store
            .set("k", "v", Some(Duration::from_secs(0)))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k2", "v2", None).await.unwrap();
        assert_eq!(store.get("k2").await.unwrap(), Some("v2".into()));
    }

    #[tokio::test]
    async fn prune_reclaims_expired_entries() {
        let store = MemoryStore::new();
        store
            .set("dead", "v", Some(Duration::from_secs(0)))
            .await
            .unwrap();
        store.set("live", "v", None).await.unwrap();

        assert_eq!(store.prune_expired(), 1);
        assert_eq!(store.get("live").await.unwrap(), Some("v".into()));
    }

    #[tokio::test]
    async fn zrange_returns_newest_first_and_caps() {
        let store = MemoryStore::new();
        store.zadd("idx", 1.0, "a").await.unwrap();
        store.zadd("idx", 3.0, "c").await.unwrap();
        store.zadd("idx", 2.0, "b").await.unwrap();

        let recent = store.zrange_recent("idx", 2).await.unwrap();
        assert_eq!(recent, vec!["c".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn zadd_updates_existing_member_score() {
        let store = MemoryStore::new();
        store.zadd("idx", 1.0, "a").await.unwrap();
        store.zadd("idx", 5.0, "a").await.unwrap();

        let recent = store.zrange_recent("idx", 10).await.unwrap();
        assert_eq!(recent, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn set_membership_round_trip() {
        let store = MemoryStore::new();
        store.sadd("s", "x").await.unwrap();
        store.sadd("s", "x").await.unwrap();
        store.sadd("s", "y").await.unwrap();

        let mut members = store.smembers("s").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["x".to_string(), "y".to_string()]);

        store.srem("s", "x").await.unwrap();
        assert_eq!(store.smembers("s").await.unwrap(), vec!["y".to_string()]);
    }
}
