//! Rolling risk-counter persistence: `fraud:<addr>` records plus the
//! `fraud:index` set for enumerating tracked users.

use std::sync::Arc;

use crate::domain::{UserHistory, WalletAddress};
use crate::error::{Error, Result};
use crate::store::{keys, KeyedStore};

/// Keyed storage of [`UserHistory`] records.
pub struct HistoryRepository {
    store: Arc<dyn KeyedStore>,
}

impl HistoryRepository {
    #[must_use]
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    /// Fetch the history for `addr`, or a fresh record first seen now.
    pub async fn get_or_default(&self, addr: &WalletAddress) -> Result<UserHistory> {
        match self.store.get(&keys::history(addr)).await? {
            Some(body) => Ok(serde_json::from_str(&body)?),
            None => Ok(UserHistory::new(addr.clone(), chrono::Utc::now())),
        }
    }

    /// Compare-and-set write on the history's version token.
    pub async fn update(&self, history: &mut UserHistory) -> Result<()> {
        if let Some(body) = self.store.get(&keys::history(&history.address)).await? {
            let stored: UserHistory = serde_json::from_str(&body)?;
            if stored.version != history.version {
                return Err(Error::Conflict {
                    entity: keys::history(&history.address),
                    expected: history.version,
                    found: stored.version,
                });
            }
        }
        history.version += 1;
        let body = serde_json::to_string(history)?;
        self.store
            .set(&keys::history(&history.address), &body, Some(keys::HISTORY_TTL))
            .await?;
        self.store
            .sadd(keys::HISTORY_INDEX, history.address.as_str())
            .await?;
        Ok(())
    }

    /// Every tracked user, for the scheduled counter resets.
    pub async fn all(&self) -> Result<Vec<UserHistory>> {
        let addrs = self.store.smembers(keys::HISTORY_INDEX).await?;
        let mut histories = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let key = keys::history(&WalletAddress::new(&addr));
            if let Some(body) = self.store.get(&key).await? {
                histories.push(serde_json::from_str(&body)?);
            }
        }
        Ok(histories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn unknown_address_yields_fresh_history() {
        let repo = HistoryRepository::new(Arc::new(MemoryStore::new()));
        let history = repo
            .get_or_default(&WalletAddress::new("0xnew"))
            .await
            .unwrap();
        assert_eq!(history.orders_last_hour, 0);
        assert_eq!(history.completed_orders, 0);
    }

    #[tokio::test]
    async fn update_persists_and_indexes() {
        let repo = HistoryRepository::new(Arc::new(MemoryStore::new()));
        let addr = WalletAddress::new("0xuser");

        let mut history = repo.get_or_default(&addr).await.unwrap();
        history.orders_last_hour = 3;
        repo.update(&mut history).await.unwrap();

        let loaded = repo.get_or_default(&addr).await.unwrap();
        assert_eq!(loaded.orders_last_hour, 3);
        assert_eq!(repo.all().await.unwrap().len(), 1);
    }
}
