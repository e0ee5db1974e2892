//! Persistence over the keyed store.
//!
//! Each repository serializes its entity to JSON, enforces the key schema
//! and TTLs, and maintains the corresponding index. Updates are
//! compare-and-set on the entity's version token: a write whose version
//! does not match the stored record is rejected with [`Error::Conflict`]
//! rather than silently overwriting. The compare and the set are two store
//! round trips, so a narrow race window remains; that is an accepted
//! limitation of the plain keyed store.
//!
//! A `get` on a record whose TTL lapsed returns `None`: callers cannot
//! distinguish absent from expired.

mod history;
mod order;
mod validator;

pub use history::HistoryRepository;
pub use order::OrderRepository;
pub use validator::ValidatorRepository;
