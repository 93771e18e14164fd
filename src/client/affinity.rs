//! Thread-affinity decorator
//!
//! Sessions are driven by a single-threaded runtime. [`ThreadCheckedClient`]
//! lets producers on other threads publish and manage subscriptions without
//! touching the session directly: such calls are posted to the owning
//! runtime and return immediately.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use async_trait::async_trait;
use serde_json::Value;
use tokio::runtime::Handle;

use super::{
    ChannelPosition, Client, PublishCallbacks, Subscription, SubscriptionCallbacks,
    SubscriptionOptions,
};
use crate::error::Result;

/// Client bound to the thread that drives it
pub struct ThreadCheckedClient<C> {
    client: Arc<C>,
    handle: Handle,
    owner: ThreadId,
}

impl<C> Clone for ThreadCheckedClient<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            handle: self.handle.clone(),
            owner: self.owner,
        }
    }
}

impl<C: Client + 'static> ThreadCheckedClient<C> {
    /// Bind `client` to `owner`, whose runtime is reachable through `handle`
    pub fn new(client: Arc<C>, handle: Handle, owner: ThreadId) -> Self {
        Self {
            client,
            handle,
            owner,
        }
    }

    /// Bind `client` to the calling thread and its runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current(client: Arc<C>) -> Self {
        Self::new(client, Handle::current(), thread::current().id())
    }

    pub fn inner(&self) -> &Arc<C> {
        &self.client
    }

    fn on_owner(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn require_owner(&self, operation: &str) {
        assert!(
            self.on_owner(),
            "{} must be called on the client's thread",
            operation
        );
    }

    fn post<T>(&self, operation: &'static str, call: T)
    where
        T: FnOnce(&C) + Send + 'static,
    {
        tracing::warn!(
            operation = operation,
            "Client called from a foreign thread, posting to its runtime"
        );
        let client = Arc::clone(&self.client);
        self.handle.spawn(async move { call(&client) });
    }
}

#[async_trait]
impl<C: Client + 'static> Client for ThreadCheckedClient<C> {
    async fn start(&self) -> Result<()> {
        self.require_owner("start");
        self.client.start().await
    }

    async fn stop(&self) -> Result<()> {
        self.require_owner("stop");
        self.client.stop().await
    }

    fn publish(&self, channel: &str, message: Value, callbacks: Option<Arc<dyn PublishCallbacks>>) {
        if self.on_owner() {
            return self.client.publish(channel, message, callbacks);
        }

        let channel = channel.to_owned();
        self.post("publish", move |client| {
            client.publish(&channel, message, callbacks)
        });
    }

    fn subscribe(
        &self,
        channel: &str,
        subscription: Subscription,
        callbacks: Arc<dyn SubscriptionCallbacks>,
        options: Option<SubscriptionOptions>,
    ) {
        if self.on_owner() {
            return self
                .client
                .subscribe(channel, subscription, callbacks, options);
        }

        let channel = channel.to_owned();
        self.post("subscribe", move |client| {
            client.subscribe(&channel, subscription, callbacks, options)
        });
    }

    fn unsubscribe(&self, subscription: Subscription) {
        if self.on_owner() {
            return self.client.unsubscribe(subscription);
        }

        self.post("unsubscribe", move |client| client.unsubscribe(subscription));
    }

    fn position(&self, subscription: Subscription) -> Result<ChannelPosition> {
        self.require_owner("position");
        self.client.position(subscription)
    }

    fn is_up(&self, subscription: Subscription) -> Result<bool> {
        self.require_owner("is_up");
        self.client.is_up(subscription)
    }
}
