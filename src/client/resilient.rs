//! Reconnecting client decorator
//!
//! [`ResilientClient`] turns a connection-fatal error from its current
//! session into a single reconnect attempt: a fresh session is built from
//! the factory, started if the decorator was started, and every live
//! subscription is replayed onto it in the order it was first made.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{
    ChannelPosition, Client, ErrorCallbacks, PublishCallbacks, Subscription,
    SubscriptionCallbacks, SubscriptionOptions,
};
use crate::error::{ClientError, Result};

/// Everything needed to re-issue a subscribe on a new session
#[derive(Clone)]
pub struct SubscriptionInfo {
    pub channel: String,
    pub subscription: Subscription,
    pub callbacks: Arc<dyn SubscriptionCallbacks>,
    pub options: Option<SubscriptionOptions>,
}

impl std::fmt::Debug for SubscriptionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionInfo")
            .field("channel", &self.channel)
            .field("subscription", &self.subscription)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Error callbacks handed to each session; forwards to the supervisor
struct ErrorReporter {
    errors: mpsc::UnboundedSender<ClientError>,
}

impl ErrorCallbacks for ErrorReporter {
    fn on_error(&self, error: ClientError) {
        // Receiver is gone once the decorator is dropped
        let _ = self.errors.send(error);
    }
}

struct Shared<C, F> {
    factory: Mutex<F>,
    client: Mutex<Option<Arc<C>>>,
    started: AtomicBool,
    /// Subscriptions to restore after a reconnect, in subscribe order
    replay: Mutex<Vec<SubscriptionInfo>>,
    callbacks: Arc<dyn ErrorCallbacks>,
    errors: mpsc::UnboundedSender<ClientError>,
    supervisor: Mutex<Option<mpsc::UnboundedReceiver<ClientError>>>,
}

impl<C, F> Shared<C, F>
where
    C: Client + 'static,
    F: FnMut(Arc<dyn ErrorCallbacks>) -> C + Send + 'static,
{
    fn create(&self) -> Arc<C> {
        let reporter: Arc<dyn ErrorCallbacks> = Arc::new(ErrorReporter {
            errors: self.errors.clone(),
        });
        let mut factory = self.factory.lock();
        Arc::new((*factory)(reporter))
    }

    /// Current session, created on first use
    fn session(&self) -> Arc<C> {
        let mut slot = self.client.lock();
        match slot.as_ref() {
            Some(client) => Arc::clone(client),
            None => {
                let client = self.create();
                *slot = Some(Arc::clone(&client));
                client
            }
        }
    }

    fn spawn_supervisor(self: &Arc<Self>) {
        let Some(errors) = self.supervisor.lock().take() else {
            return;
        };
        tokio::spawn(supervise(Arc::downgrade(self), errors));
    }

    async fn on_error(&self, error: ClientError) {
        tracing::warn!(error = %error, "RTM session failed, reconnecting");
        // Failures are reported by restart itself
        let _ = self.restart().await;
    }

    async fn restart(&self) -> Result<()> {
        let fresh = self.create();

        if !self.started.load(Ordering::SeqCst) {
            let previous = self.client.lock().replace(fresh);
            drop(previous);
            return Ok(());
        }

        if let Err(e) = fresh.start().await {
            tracing::error!(error = %e, "Reconnect failed");
            let previous = self.client.lock().replace(fresh);
            drop(previous);
            self.callbacks.on_error(e);
            return Err(e);
        }

        let previous = {
            let replay = self.replay.lock();
            for info in replay.iter() {
                fresh.subscribe(
                    &info.channel,
                    info.subscription,
                    Arc::clone(&info.callbacks),
                    info.options.clone(),
                );
            }
            tracing::info!(subscriptions = replay.len(), "RTM session restored");
            self.client.lock().replace(fresh)
        };
        drop(previous);

        Ok(())
    }
}

/// Drain session errors until the decorator goes away
async fn supervise<C, F>(shared: Weak<Shared<C, F>>, mut errors: mpsc::UnboundedReceiver<ClientError>)
where
    C: Client + 'static,
    F: FnMut(Arc<dyn ErrorCallbacks>) -> C + Send + 'static,
{
    while let Some(error) = errors.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.on_error(error).await;
    }
    tracing::debug!("Reconnect supervisor finished");
}

/// Client that reconnects and restores subscriptions after failures
///
/// `factory` builds a session from the error callbacks it must report
/// through. Sessions are created lazily and replaced wholesale on error.
/// Only a failed reconnect reaches `callbacks`; errors that are recovered
/// from are logged and otherwise silent.
pub struct ResilientClient<C, F> {
    shared: Arc<Shared<C, F>>,
}

impl<C, F> ResilientClient<C, F>
where
    C: Client + 'static,
    F: FnMut(Arc<dyn ErrorCallbacks>) -> C + Send + 'static,
{
    pub fn new(factory: F, callbacks: Arc<dyn ErrorCallbacks>) -> Self {
        let (errors, receiver) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                factory: Mutex::new(factory),
                client: Mutex::new(None),
                started: AtomicBool::new(false),
                replay: Mutex::new(Vec::new()),
                callbacks,
                errors,
                supervisor: Mutex::new(Some(receiver)),
            }),
        }
    }

    /// Replace the current session with a fresh one
    ///
    /// If this client was never started, the fresh session is installed
    /// as is. Otherwise it is started and the replay list is re-subscribed
    /// on it. A start failure is reported through this client's callbacks
    /// and returned; no further attempt is made.
    pub async fn restart(&self) -> Result<()> {
        self.shared.restart().await
    }

    /// Subscriptions that would be restored by a reconnect
    pub fn replay_list(&self) -> Vec<SubscriptionInfo> {
        self.shared.replay.lock().clone()
    }

    /// The session currently in use, if one was created
    pub fn current(&self) -> Option<Arc<C>> {
        self.shared.client.lock().clone()
    }

    pub fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C, F> Client for ResilientClient<C, F>
where
    C: Client + 'static,
    F: FnMut(Arc<dyn ErrorCallbacks>) -> C + Send + 'static,
{
    async fn start(&self) -> Result<()> {
        self.shared.spawn_supervisor();
        let client = self.shared.session();
        self.shared.started.store(true, Ordering::SeqCst);
        client.start().await
    }

    async fn stop(&self) -> Result<()> {
        self.shared.started.store(false, Ordering::SeqCst);
        let client = self.shared.session();
        client.stop().await
    }

    fn publish(&self, channel: &str, message: Value, callbacks: Option<Arc<dyn PublishCallbacks>>) {
        self.shared.session().publish(channel, message, callbacks);
    }

    fn subscribe(
        &self,
        channel: &str,
        subscription: Subscription,
        callbacks: Arc<dyn SubscriptionCallbacks>,
        options: Option<SubscriptionOptions>,
    ) {
        let mut replay = self.shared.replay.lock();
        replay.push(SubscriptionInfo {
            channel: channel.to_owned(),
            subscription,
            callbacks: Arc::clone(&callbacks),
            options: options.clone(),
        });
        self.shared
            .session()
            .subscribe(channel, subscription, callbacks, options);
    }

    fn unsubscribe(&self, subscription: Subscription) {
        let mut replay = self.shared.replay.lock();
        replay.retain(|info| info.subscription != subscription);
        self.shared.session().unsubscribe(subscription);
    }

    fn position(&self, subscription: Subscription) -> Result<ChannelPosition> {
        self.shared.session().position(subscription)
    }

    fn is_up(&self, subscription: Subscription) -> Result<bool> {
        self.shared.session().is_up(subscription)
    }
}
