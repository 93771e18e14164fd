//! Test doubles shared by unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{
    ChannelPosition, Client, ErrorCallbacks, PublishCallbacks, Subscription,
    SubscriptionCallbacks, SubscriptionOptions,
};
use crate::error::{ClientError, Result};

/// Callbacks that ignore everything
pub(crate) struct NullCallbacks;

impl ErrorCallbacks for NullCallbacks {}
impl SubscriptionCallbacks for NullCallbacks {}
impl PublishCallbacks for NullCallbacks {}

/// Callbacks that remember what they were given
#[derive(Default)]
pub(crate) struct RecordingCallbacks {
    errors: Mutex<Vec<ClientError>>,
    data: Mutex<Vec<(Subscription, Value)>>,
}

impl RecordingCallbacks {
    pub(crate) fn errors(&self) -> Vec<ClientError> {
        self.errors.lock().clone()
    }

    pub(crate) fn data(&self) -> Vec<(Subscription, Value)> {
        self.data.lock().clone()
    }
}

impl ErrorCallbacks for RecordingCallbacks {
    fn on_error(&self, error: ClientError) {
        self.errors.lock().push(error);
    }
}

impl SubscriptionCallbacks for RecordingCallbacks {
    fn on_data(&self, subscription: Subscription, message: Value) {
        self.data.lock().push((subscription, message));
    }
}

impl PublishCallbacks for RecordingCallbacks {}

/// Operation seen by a [`MockClient`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Op {
    Start,
    Stop,
    Publish(String),
    Subscribe(String, Subscription),
    Unsubscribe(Subscription),
    Position(Subscription),
}

#[derive(Debug, Clone)]
pub(crate) struct Call {
    /// Index of the session, in creation order
    pub session: usize,
    pub op: Op,
    pub thread: ThreadId,
}

/// Shared log for every [`MockClient`] built by one factory
#[derive(Default)]
pub(crate) struct MockHub {
    calls: Mutex<Vec<Call>>,
    reporters: Mutex<Vec<Arc<dyn ErrorCallbacks>>>,
    failing_starts: AtomicUsize,
}

impl MockHub {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Factory suitable for `ResilientClient::new`
    pub(crate) fn factory(self: &Arc<Self>) -> impl FnMut(Arc<dyn ErrorCallbacks>) -> MockClient {
        let hub = Arc::clone(self);
        move |errors| {
            let mut reporters = hub.reporters.lock();
            reporters.push(errors);
            MockClient {
                index: reporters.len() - 1,
                hub: Arc::clone(&hub),
            }
        }
    }

    /// Standalone client, not tied to a factory
    pub(crate) fn client(self: &Arc<Self>) -> MockClient {
        let mut factory = self.factory();
        factory(Arc::new(NullCallbacks))
    }

    /// Make the next `count` starts fail
    pub(crate) fn fail_starts(&self, count: usize) {
        self.failing_starts.store(count, Ordering::SeqCst);
    }

    /// Report `error` through the callbacks handed to session `index`
    pub(crate) fn report(&self, index: usize, error: ClientError) {
        let reporter = Arc::clone(&self.reporters.lock()[index]);
        reporter.on_error(error);
    }

    pub(crate) fn sessions(&self) -> usize {
        self.reporters.lock().len()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Operations seen by session `index`
    pub(crate) fn ops(&self, index: usize) -> Vec<Op> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.session == index)
            .map(|call| call.op.clone())
            .collect()
    }

    fn record(&self, session: usize, op: Op) {
        self.calls.lock().push(Call {
            session,
            op,
            thread: thread::current().id(),
        });
    }
}

/// Client that records calls instead of talking to a server
pub(crate) struct MockClient {
    index: usize,
    hub: Arc<MockHub>,
}

#[async_trait]
impl Client for MockClient {
    async fn start(&self) -> Result<()> {
        self.hub.record(self.index, Op::Start);

        let failing = &self.hub.failing_starts;
        if failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ClientError::TransportError);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.hub.record(self.index, Op::Stop);
        Ok(())
    }

    fn publish(&self, channel: &str, _message: Value, _callbacks: Option<Arc<dyn PublishCallbacks>>) {
        self.hub.record(self.index, Op::Publish(channel.to_owned()));
    }

    fn subscribe(
        &self,
        channel: &str,
        subscription: Subscription,
        _callbacks: Arc<dyn SubscriptionCallbacks>,
        _options: Option<SubscriptionOptions>,
    ) {
        self.hub
            .record(self.index, Op::Subscribe(channel.to_owned(), subscription));
    }

    fn unsubscribe(&self, subscription: Subscription) {
        self.hub.record(self.index, Op::Unsubscribe(subscription));
    }

    fn position(&self, subscription: Subscription) -> Result<ChannelPosition> {
        self.hub.record(self.index, Op::Position(subscription));
        Ok(ChannelPosition::new(1, 42))
    }

    fn is_up(&self, _subscription: Subscription) -> Result<bool> {
        Ok(true)
    }
}

/// Let spawned tasks on the current runtime run
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
