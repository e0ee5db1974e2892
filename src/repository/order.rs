//! Order persistence: `order:<id>` records plus the `order:index`
//! sorted set scored by creation time.

use std::sync::Arc;

use crate::domain::{Order, OrderId, OrderStatus};
use crate::error::{Error, LifecycleError, Result};
use crate::store::{keys, KeyedStore};

/// Keyed storage of [`Order`] records with a time-ordered index.
pub struct OrderRepository {
    store: Arc<dyn KeyedStore>,
}

impl OrderRepository {
    #[must_use]
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    /// Persist a freshly created order and index it by creation time.
    pub async fn insert(&self, order: &Order) -> Result<()> {
        let key = keys::order(&order.id);
        let body = serde_json::to_string(order)?;
        self.store.set(&key, &body, Some(keys::ORDER_TTL)).await?;
        self.store
            .zadd(
                keys::ORDER_INDEX,
                order.created_at.timestamp_millis() as f64,
                order.id.as_str(),
            )
            .await?;
        Ok(())
    }

    /// Compare-and-set write: rejects a stale `version` with
    /// [`Error::Conflict`], then bumps the version and persists.
    pub async fn update(&self, order: &mut Order) -> Result<()> {
        let stored = self.get(&order.id).await?.ok_or_else(|| {
            Error::Lifecycle(LifecycleError::NotFound {
                order_id: order.id.to_string(),
            })
        })?;
        if stored.version != order.version {
            return Err(Error::Conflict {
                entity: keys::order(&order.id),
                expected: order.version,
                found: stored.version,
            });
        }
        order.version += 1;
        let body = serde_json::to_string(order)?;
        self.store
            .set(&keys::order(&order.id), &body, Some(keys::ORDER_TTL))
            .await?;
        Ok(())
    }

    /// Fetch by id; `None` covers both never-existed and TTL-lapsed.
    pub async fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        let Some(body) = self.store.get(&keys::order(id)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&body)?))
    }

    /// Most recently created orders, newest first. Index entries whose
    /// record already expired are skipped.
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<Order>> {
        let ids = self.store.zrange_recent(keys::ORDER_INDEX, limit).await?;
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(order) = self.get(&OrderId::new(id)).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    /// Recent orders still waiting for a solver.
    pub async fn open_orders(&self, limit: usize) -> Result<Vec<Order>> {
        let orders = self.list_recent(limit).await?;
        Ok(orders
            .into_iter()
            .filter(|o| o.status == OrderStatus::Created)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, LockedRate, RateQuote, RateSource, TokenAmount, WalletAddress};
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn make_order() -> Order {
        let now = Utc::now();
        let rate = LockedRate::new(dec!(17.50), RateSource::Oracle, now, now + Duration::minutes(5));
        let quote = RateQuote::derive(
            &rate,
            TokenAmount::from_tokens(50),
            dec!(0.5),
            TokenAmount::from_tokens(10),
            TokenAmount::from_units(120_000),
            "MXN",
        );
        Order::new(
            Direction::Sell,
            "user-1",
            WalletAddress::new("0xreq"),
            TokenAmount::from_tokens(50),
            quote,
            "spei",
            None,
            now,
        )
    }

    fn repo() -> OrderRepository {
        OrderRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let repo = repo();
        let order = make_order();
        repo.insert(&order).await.unwrap();

        let loaded = repo.get(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, order.id);
        assert_eq!(loaded.status, order.status);
        assert_eq!(loaded.quote, order.quote);
    }

    #[tokio::test]
    async fn missing_order_reads_as_none() {
        let repo = repo();
        assert!(repo.get(&OrderId::from("ord-missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_version_write_is_rejected() {
        let repo = repo();
        let order = make_order();
        repo.insert(&order).await.unwrap();

        // Two instances load the same record.
        let mut first = repo.get(&order.id).await.unwrap().unwrap();
        let mut second = repo.get(&order.id).await.unwrap().unwrap();

        first.cancel().unwrap();
        repo.update(&mut first).await.unwrap();

        second.cancel().unwrap();
        let err = repo.update(&mut second).await.unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[tokio::test]
    async fn open_orders_filters_matched() {
        let repo = repo();
        let open = make_order();
        repo.insert(&open).await.unwrap();

        let mut matched = make_order();
        repo.insert(&matched).await.unwrap();
        matched
            .match_with("solver-1".into(), WalletAddress::new("0xsol"), Utc::now())
            .unwrap();
        repo.update(&mut matched).await.unwrap();

        let open_orders = repo.open_orders(10).await.unwrap();
        assert_eq!(open_orders.len(), 1);
        assert_eq!(open_orders[0].id, open.id);
    }
}
