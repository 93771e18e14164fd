//! RTM pub/sub client
//!
//! Publishes to and subscribes on RTM channels over a single TLS websocket.
//! The crate is layered:
//!
//! - [`protocol`]: JSON wire documents and their classification
//! - [`registry`]: per-session subscription bookkeeping
//! - [`session`]: one connection and the protocol state machine over it
//! - [`client`]: the [`Client`] trait plus the reconnecting and
//!   thread-affinity decorators
//! - [`stats`]: traffic counters
//!
//! Logging goes through `tracing`; install a subscriber to see it.

pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod stats;

pub use client::{
    ChannelPosition, Client, ClientConfig, ErrorCallbacks, HistoryOptions, PublishCallbacks,
    ResilientClient, Subscription, SubscriptionCallbacks, SubscriptionOptions,
    ThreadCheckedClient,
};
pub use error::{ClientError, Result};
pub use session::{SecureClient, SessionState};
