//! Subscription registry
//!
//! Tracks one record per subscribed channel along with the request id the
//! record is waiting on, so server responses can be routed back.
//!
//! ```text
//!                  SubscriptionRegistry
//!          ┌──────────────────────────────────┐
//!          │ records:  channel ─► record      │
//!          │ handles:  Subscription ─► channel│
//!          └──────────────────────────────────┘
//!  subscribe/ok {id} ──► find_by_request_mut(id)
//!  subscription/data ──► get(subscription_id)
//!  unsubscribe(sub)  ──► channel_of(sub)
//! ```
//!
//! The registry is owned by a single session and is never shared, so it
//! carries no synchronization of its own.

pub mod entry;
pub mod error;
pub mod store;

pub use entry::{SubscriptionRecord, SubscriptionStatus};
pub use error::RegistryError;
pub use store::SubscriptionRegistry;
