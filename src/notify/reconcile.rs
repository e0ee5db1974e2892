//! Cross-instance notification reconciliation.
//!
//! Orders created on other instances never hit this instance's hub
//! directly. The reconciler periodically diffs the authoritative store
//! against the locally announced set and emits only the delta, bounding
//! both staleness and bandwidth.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::domain::OrderId;
use crate::error::Result;
use crate::repository::OrderRepository;

use super::NotificationHub;

/// Emits `new_order` events for open orders this instance has not yet
/// announced. The announced set lives on the hub and is shared with the
/// direct broadcast path, so an order created on this instance is never
/// announced a second time by the sweep.
pub struct Reconciler {
    orders: Arc<OrderRepository>,
    hub: Arc<NotificationHub>,
    scan_limit: usize,
}

impl Reconciler {
    #[must_use]
    pub fn new(orders: Arc<OrderRepository>, hub: Arc<NotificationHub>, scan_limit: usize) -> Self {
        Self {
            orders,
            hub,
            scan_limit,
        }
    }

    /// One reconciliation pass. Returns how many orders were announced.
    pub async fn run_once(&self) -> Result<usize> {
        let open = self.orders.open_orders(self.scan_limit).await?;
        let open_ids: HashSet<OrderId> = open.iter().map(|o| o.id.clone()).collect();

        let fresh: Vec<_> = open
            .into_iter()
            .filter(|o| !self.hub.is_announced(&o.id))
            .collect();

        let announced_count = fresh.len();
        for order in fresh {
            debug!(order_id = %order.id, "announcing order from reconciliation");
            self.hub.announce_order(order);
        }

        self.hub.retain_announced(&open_ids);
        Ok(announced_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, LockedRate, Order, RateQuote, RateSource, TokenAmount, WalletAddress};
    use crate::notify::StreamMessage;
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn make_order() -> Order {
        let now = Utc::now();
        let rate = LockedRate::new(dec!(17.5), RateSource::Oracle, now, now + Duration::minutes(5));
        let quote = RateQuote::derive(
            &rate,
            TokenAmount::from_tokens(10),
            dec!(0.5),
            TokenAmount::from_tokens(10),
            TokenAmount::from_units(120_000),
            "MXN",
        );
        Order::new(
            Direction::Sell,
            "user-1",
            WalletAddress::new("0xreq"),
            TokenAmount::from_tokens(10),
            quote,
            "spei",
            None,
            now,
        )
    }

    #[tokio::test]
    async fn announces_each_open_order_exactly_once() {
        let repo = Arc::new(OrderRepository::new(Arc::new(MemoryStore::new())));
        let hub = Arc::new(NotificationHub::new(16));
        let reconciler = Reconciler::new(repo.clone(), hub.clone(), 50);

        let (_guard, mut rx) = hub.register("s1".into());

        let order = make_order();
        repo.insert(&order).await.unwrap();

        assert_eq!(reconciler.run_once().await.unwrap(), 1);
        assert!(matches!(rx.try_recv(), Ok(StreamMessage::NewOrder { .. })));

        // Second pass: nothing new.
        assert_eq!(reconciler.run_once().await.unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn directly_announced_orders_are_not_announced_again() {
        let repo = Arc::new(OrderRepository::new(Arc::new(MemoryStore::new())));
        let hub = Arc::new(NotificationHub::new(16));
        let reconciler = Reconciler::new(repo.clone(), hub.clone(), 50);

        let (_guard, mut rx) = hub.register("s1".into());

        // The creation path persists and announces in one step.
        let order = make_order();
        repo.insert(&order).await.unwrap();
        hub.announce_order(order);
        assert!(matches!(rx.try_recv(), Ok(StreamMessage::NewOrder { .. })));

        // The sweep sees the order as already announced.
        assert_eq!(reconciler.run_once().await.unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn reannounces_if_order_reopens_after_leaving_set() {
        let repo = Arc::new(OrderRepository::new(Arc::new(MemoryStore::new())));
        let hub = Arc::new(NotificationHub::new(16));
        let reconciler = Reconciler::new(repo.clone(), hub.clone(), 50);

        let order = make_order();
        repo.insert(&order).await.unwrap();
        assert_eq!(reconciler.run_once().await.unwrap(), 1);

        // Order gets matched; it leaves the open set and the announced set.
        let mut matched = repo.get(&order.id).await.unwrap().unwrap();
        matched
            .match_with("s1".into(), WalletAddress::new("0xsol"), Utc::now())
            .unwrap();
        repo.update(&mut matched).await.unwrap();
        assert_eq!(reconciler.run_once().await.unwrap(), 0);
    }
}
