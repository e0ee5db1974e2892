//! Push-stream message kinds, one connection per solver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Order, SolverId};

/// Tag attached to an `order_update` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Matched,
    PaymentPending,
    PaymentSent,
    Verifying,
    Completed,
    Disputed,
    Mediation,
    Settled,
    Cancelled,
    Expired,
}

/// Messages flowing down a solver's push stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Handshake acknowledging the subscription.
    Connected { solver: SolverId },
    /// Snapshot of open orders, capped at the configured batch size.
    ActiveOrders { orders: Vec<Order> },
    /// A freshly created order looking for a solver.
    NewOrder { order: Box<Order> },
    /// An order this instance knows about changed state.
    OrderUpdate {
        update: UpdateKind,
        order: Box<Order>,
    },
    /// Liveness signal on idle connections.
    Ping { at: DateTime<Utc> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_serialize_with_snake_case_tags() {
        let msg = StreamMessage::Ping { at: Utc::now() };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "ping");

        let msg = StreamMessage::Connected {
            solver: SolverId::new("solver-1"),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "connected");
        assert_eq!(json["solver"], "solver-1");
    }

    #[test]
    fn order_messages_compare_by_value() {
        let order = crate::testkit::open_order("0xalice", 5);
        let first = StreamMessage::NewOrder {
            order: Box::new(order.clone()),
        };
        let second = StreamMessage::NewOrder {
            order: Box::new(order),
        };
        assert_eq!(first, second);
    }
}
