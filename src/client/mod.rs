//! RTM client interface
//!
//! [`Client`] is the capability surface shared by the transport session and
//! by every decorator, so stacks are built by nesting:
//!
//! ```text
//! ThreadCheckedClient ─► ResilientClient ─► SecureClient ─► websocket
//! ```
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use rtm_client::client::{
//!     ClientConfig, Client, ErrorCallbacks, ResilientClient, Subscription,
//!     SubscriptionCallbacks,
//! };
//! use rtm_client::session::SecureClient;
//!
//! struct Printer;
//! impl ErrorCallbacks for Printer {}
//! impl SubscriptionCallbacks for Printer {
//!     fn on_data(&self, _sub: Subscription, message: serde_json::Value) {
//!         println!("{message}");
//!     }
//! }
//!
//! # async fn example() -> rtm_client::error::Result<()> {
//! let config = ClientConfig::new("rtm.example.com", 443, "my-appkey");
//! let client = ResilientClient::new(
//!     move |errors| SecureClient::new(config.clone(), errors),
//!     Arc::new(Printer),
//! );
//! client.start().await?;
//!
//! let sub = Subscription::new();
//! client.subscribe("telemetry", sub, Arc::new(Printer), None);
//! # Ok(())
//! # }
//! ```

pub mod affinity;
pub mod config;
pub mod position;
pub mod resilient;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ClientError, Result};

pub use affinity::ThreadCheckedClient;
pub use config::ClientConfig;
pub use position::ChannelPosition;
pub use resilient::{ResilientClient, SubscriptionInfo};

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Caller-owned identity of one logical subscription
///
/// Equality is by identity: every call to [`Subscription::new`] yields a
/// distinct handle, even when two handles are used for the same channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

impl Subscription {
    /// Allocate a fresh handle
    pub fn new() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Receiver for errors reported by a client
pub trait ErrorCallbacks: Send + Sync {
    fn on_error(&self, _error: ClientError) {}
}

/// Callbacks for publish acknowledgements
pub trait PublishCallbacks: ErrorCallbacks {
    fn on_ok(&self, _position: &ChannelPosition) {}
}

/// Callbacks for subscription data
pub trait SubscriptionCallbacks: ErrorCallbacks {
    /// Called once per message, in the order the server sent them
    fn on_data(&self, _subscription: Subscription, _message: Value) {}
}

/// History replay requested when subscribing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryOptions {
    /// Number of most recent messages to replay
    pub count: Option<u64>,
    /// Maximum age of replayed messages, in seconds
    pub age: Option<u64>,
}

/// Options for a subscribe request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionOptions {
    pub history: HistoryOptions,
}

impl SubscriptionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay up to `count` recent messages
    pub fn history_count(mut self, count: u64) -> Self {
        self.history.count = Some(count);
        self
    }

    /// Replay messages no older than `age` seconds
    pub fn history_age(mut self, age: u64) -> Self {
        self.history.age = Some(age);
        self
    }
}

/// Capability surface of an RTM client
///
/// Mutating calls are fire-and-forget: their outcome, if any, arrives
/// through the callbacks passed in or the client's error callbacks.
#[async_trait]
pub trait Client: Send + Sync {
    /// Connect and begin serving requests.
    async fn start(&self) -> Result<()>;

    /// Disconnect; subscriptions are dropped once shutdown completes.
    async fn stop(&self) -> Result<()>;

    /// Publish `message` to `channel`.
    fn publish(&self, channel: &str, message: Value, callbacks: Option<Arc<dyn PublishCallbacks>>);

    /// Subscribe `subscription` to `channel`. A channel may hold only one
    /// live subscription at a time.
    fn subscribe(
        &self,
        channel: &str,
        subscription: Subscription,
        callbacks: Arc<dyn SubscriptionCallbacks>,
        options: Option<SubscriptionOptions>,
    );

    /// Remove the subscription identified by `subscription`.
    fn unsubscribe(&self, subscription: Subscription);

    /// Current position of a subscription within its channel.
    fn position(&self, subscription: Subscription) -> Result<ChannelPosition>;

    /// Whether a subscription is currently receiving data.
    fn is_up(&self, subscription: Subscription) -> Result<bool>;
}
