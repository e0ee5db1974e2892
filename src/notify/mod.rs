//! Best-effort push of order events to solvers streaming from this
//! instance, reconciled across instances by polling the order repository.

mod hub;
mod message;
mod reconcile;

pub use hub::{ConnectionGuard, NotificationHub};
pub use message::{StreamMessage, UpdateKind};
pub use reconcile::Reconciler;
