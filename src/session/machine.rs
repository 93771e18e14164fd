//! Protocol state machine
//!
//! `SessionCore` holds everything a session mutates: lifecycle state, the
//! subscription registry, the request id counter and the write queue. It
//! performs no I/O itself. Requests are serialized onto the writer task's
//! queue and inbound frames are handed in by the read loop.
//!
//! Handlers never call user code. They return [`Notification`]s which the
//! caller dispatches after releasing the core's lock, so callbacks are free
//! to call back into the client.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite;

use super::state::SessionState;
use crate::client::{ErrorCallbacks, Subscription, SubscriptionCallbacks, SubscriptionOptions};
use crate::error::ClientError;
use crate::protocol::codec::{self, Action, Inbound};
use crate::registry::{SubscriptionRecord, SubscriptionRegistry, SubscriptionStatus};
use crate::stats::{ClientStats, ControlFrame};

/// Item on the writer task's queue
#[derive(Debug)]
pub(crate) enum Outbound {
    /// Serialized request document
    Text(String),
    /// Keepalive ping; the write result is sent back
    Ping(oneshot::Sender<Result<(), tungstenite::Error>>),
}

/// Deferred callback invocation
pub(crate) enum Notification {
    Data {
        callbacks: Arc<dyn SubscriptionCallbacks>,
        subscription: Subscription,
        messages: Vec<Value>,
    },
    Error {
        callbacks: Arc<dyn ErrorCallbacks>,
        error: ClientError,
    },
}

impl Notification {
    pub(crate) fn dispatch(self) {
        match self {
            Notification::Data {
                callbacks,
                subscription,
                messages,
            } => {
                for message in messages {
                    callbacks.on_data(subscription, message);
                }
            }
            Notification::Error { callbacks, error } => callbacks.on_error(error),
        }
    }
}

pub(crate) fn dispatch_all(notifications: Vec<Notification>) {
    for notification in notifications {
        notification.dispatch();
    }
}

/// What the read loop should do after a frame
pub(crate) enum ReadOutcome {
    /// Dispatch and read the next frame
    Continue(Vec<Notification>),
    /// Dispatch and stop reading
    Halt(Vec<Notification>),
}

pub(crate) struct SessionCore {
    client_id: u64,
    state: SessionState,
    /// Set once the session has reached `Running`
    started: bool,
    /// Read loop is consuming frames
    reading: bool,
    fatal_reported: bool,
    request_id: u64,
    registry: SubscriptionRegistry,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    callbacks: Arc<dyn ErrorCallbacks>,
    stats: ClientStats,
}

impl SessionCore {
    pub(crate) fn new(client_id: u64, callbacks: Arc<dyn ErrorCallbacks>) -> Self {
        Self {
            client_id,
            state: SessionState::Stopped,
            started: false,
            reading: false,
            fatal_reported: false,
            request_id: 0,
            registry: SubscriptionRegistry::new(),
            outbound: None,
            callbacks,
            stats: ClientStats::new(),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub(crate) fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// Panics unless the session can be started
    pub(crate) fn check_startable(&self) {
        assert_eq!(
            self.state,
            SessionState::Stopped,
            "RTM client must be stopped to start"
        );
        assert!(
            !self.started,
            "RTM session was already started once; create a new instance"
        );
    }

    /// Connection is up; begin serving requests
    pub(crate) fn on_started(&mut self, outbound: mpsc::UnboundedSender<Outbound>) {
        self.check_startable();
        self.outbound = Some(outbound);
        self.state = SessionState::Running;
        self.started = true;
        self.reading = true;
    }

    /// Move to `PendingStopped`
    ///
    /// If the read loop has already halted nothing is left to wind down, so
    /// the session goes straight to `Stopped`.
    pub(crate) fn begin_stop(&mut self) {
        assert_eq!(
            self.state,
            SessionState::Running,
            "RTM client is not running"
        );
        self.state = SessionState::PendingStopped;
        self.outbound = None;

        if !self.reading {
            self.finish_stop();
        }
    }

    /// Read loop observed the stop request
    pub(crate) fn finish_stop(&mut self) {
        assert_eq!(
            self.state,
            SessionState::PendingStopped,
            "stop completed while not stopping"
        );
        tracing::info!(
            client_id = self.client_id,
            subscriptions = self.registry.len(),
            "RTM client stopped"
        );
        self.state = SessionState::Stopped;
        self.reading = false;
        self.outbound = None;
        self.registry.clear();
    }

    pub(crate) fn publish(&mut self, channel: &str, message: Value) {
        if !self.accepts_requests("publish") {
            return;
        }

        let document = codec::encode_publish(channel, message);
        let bytes = self.write(&document);
        self.stats.record_publish(channel, bytes);
    }

    pub(crate) fn subscribe(
        &mut self,
        channel: &str,
        subscription: Subscription,
        callbacks: Arc<dyn SubscriptionCallbacks>,
        options: Option<&SubscriptionOptions>,
    ) {
        if !self.accepts_requests("subscribe") {
            return;
        }

        let request_id = self.next_request_id();
        let record = SubscriptionRecord::pending(channel, subscription, callbacks, request_id);
        if let Err(e) = self.registry.insert(record) {
            panic!("Duplicate subscribe to {}: {}", channel, e);
        }

        let history = options.map(|o| o.history.clone()).unwrap_or_default();
        let document = codec::encode_subscribe(request_id, channel, &history);
        let bytes = self.write(&document);
        self.stats.record_write(bytes);

        tracing::debug!(
            client_id = self.client_id,
            channel = %channel,
            request_id = request_id,
            document = %document,
            "Requested subscribe"
        );
    }

    pub(crate) fn unsubscribe(&mut self, subscription: Subscription) {
        if !self.accepts_requests("unsubscribe") {
            return;
        }

        let channel = match self.registry.channel_of(subscription) {
            Ok(channel) => channel.to_owned(),
            Err(e) => panic!("Didn't find subscription to remove: {}", e),
        };

        let request_id = self.next_request_id();
        let document = codec::encode_unsubscribe(request_id, &channel);
        let bytes = self.write(&document);
        self.stats.record_write(bytes);

        if let Some(record) = self.registry.get_mut(&channel) {
            record.begin_unsubscribe(request_id);
        }

        tracing::debug!(
            client_id = self.client_id,
            channel = %channel,
            request_id = request_id,
            document = %document,
            "Requested unsubscribe"
        );
    }

    /// Handle one inbound data frame
    pub(crate) fn on_frame(&mut self, bytes: &[u8]) -> ReadOutcome {
        self.stats.record_read(bytes.len());
        tracing::trace!(client_id = self.client_id, size = bytes.len(), "Frame received");

        match codec::decode(bytes) {
            Ok(inbound) => ReadOutcome::Continue(self.process_input(inbound, bytes.len())),
            Err(e) => {
                tracing::error!(
                    client_id = self.client_id,
                    error = %e,
                    message = %String::from_utf8_lossy(bytes),
                    "Parse message error"
                );
                self.reading = false;
                ReadOutcome::Halt(self.fatal(ClientError::InvalidMessageError))
            }
        }
    }

    /// Read loop hit a transport error and is halting
    pub(crate) fn on_transport_error(&mut self, reason: &str) -> Vec<Notification> {
        self.reading = false;

        match self.state {
            SessionState::Running => {
                tracing::error!(client_id = self.client_id, error = reason, "Transport error");
                self.fatal(ClientError::TransportError)
            }
            SessionState::PendingStopped => {
                tracing::info!(
                    client_id = self.client_id,
                    error = reason,
                    "Connection closed while stopping"
                );
                self.finish_stop();
                Vec::new()
            }
            SessionState::Stopped => {
                tracing::info!(
                    client_id = self.client_id,
                    error = reason,
                    state = %self.state,
                    "Ignoring transport error"
                );
                Vec::new()
            }
        }
    }

    pub(crate) fn on_ping_sent(&mut self) {
        self.stats.record_ping();
        tracing::trace!(client_id = self.client_id, "Ping sent");
    }

    /// Read loop aborted on a broken protocol contract
    ///
    /// The session halts like it does on a transport error, but the fault
    /// is reported as `InvalidResponse` so an owner can replace it.
    pub(crate) fn on_contract_violation(&mut self, reason: &str) -> Vec<Notification> {
        self.reading = false;

        match self.state {
            SessionState::Running => {
                tracing::error!(
                    client_id = self.client_id,
                    error = reason,
                    "Protocol contract violated, halting session"
                );
                self.fatal(ClientError::InvalidResponse)
            }
            SessionState::PendingStopped => {
                tracing::error!(
                    client_id = self.client_id,
                    error = reason,
                    "Protocol contract violated while stopping"
                );
                self.finish_stop();
                Vec::new()
            }
            SessionState::Stopped => Vec::new(),
        }
    }

    pub(crate) fn on_ping_failed(&mut self, reason: &str) -> Vec<Notification> {
        if self.state.is_running() {
            tracing::error!(client_id = self.client_id, error = reason, "Ping failed");
            self.fatal(ClientError::TransportError)
        } else {
            tracing::info!(
                client_id = self.client_id,
                error = reason,
                state = %self.state,
                "Ignoring ping failure"
            );
            Vec::new()
        }
    }

    pub(crate) fn on_control_frame(&mut self, frame: ControlFrame) {
        self.stats.record_control_frame(frame);
        tracing::trace!(client_id = self.client_id, frame = ?frame, "Control frame received");
    }

    /// Dispatch a decoded document by action
    pub(crate) fn process_input(&mut self, inbound: Inbound, byte_size: usize) -> Vec<Notification> {
        let Inbound { action, document } = inbound;
        self.stats.record_action(action.name());

        match action {
            Action::SubscriptionData {
                subscription_id,
                messages,
            } => {
                let Some(record) = self.registry.get(&subscription_id) else {
                    panic!("Got data for unknown subscription: {}", document);
                };

                match record.status {
                    SubscriptionStatus::Current => {}
                    SubscriptionStatus::PendingUnsubscribe => {
                        tracing::debug!(
                            channel = %subscription_id,
                            "Got data for subscription pending deletion"
                        );
                        return Vec::new();
                    }
                    SubscriptionStatus::PendingSubscribe => {
                        panic!("Got data for unconfirmed subscription: {}", document);
                    }
                }

                let notification = Notification::Data {
                    callbacks: Arc::clone(&record.callbacks),
                    subscription: record.subscription,
                    messages,
                };
                self.stats.record_data(&subscription_id, byte_size);
                vec![notification]
            }
            Action::SubscribeOk { id } => {
                let record = self.correlated(
                    id,
                    SubscriptionStatus::PendingSubscribe,
                    "subscribe confirmation",
                    &document,
                );
                record.confirm();
                tracing::debug!(
                    channel = %record.channel,
                    request_id = id,
                    pending = ?record.created_at.elapsed(),
                    "Subscribe confirmed"
                );
                Vec::new()
            }
            Action::SubscribeError { id } => {
                let channel = self
                    .correlated(
                        id,
                        SubscriptionStatus::PendingSubscribe,
                        "subscribe error",
                        &document,
                    )
                    .channel
                    .clone();
                tracing::error!(channel = %channel, document = %document, "Got subscribe error");
                self.registry.remove(&channel);
                self.report(ClientError::SubscribeError)
            }
            Action::UnsubscribeOk { id } => {
                let channel = self
                    .correlated(
                        id,
                        SubscriptionStatus::PendingUnsubscribe,
                        "unsubscribe confirmation",
                        &document,
                    )
                    .channel
                    .clone();
                tracing::debug!(channel = %channel, request_id = id, "Unsubscribe confirmed");
                self.registry.remove(&channel);
                Vec::new()
            }
            Action::UnsubscribeError { id } => {
                let channel = self
                    .correlated(
                        id,
                        SubscriptionStatus::PendingUnsubscribe,
                        "unsubscribe error",
                        &document,
                    )
                    .channel
                    .clone();
                tracing::error!(channel = %channel, document = %document, "Got unsubscribe error");
                self.registry.remove(&channel);
                self.report(ClientError::UnsubscribeError)
            }
            Action::SubscriptionError => {
                tracing::error!(document = %document, "Subscription error");
                self.report(ClientError::SubscriptionError)
            }
            Action::Unsupported(_) => panic!("Unsupported action: {}", document),
        }
    }

    /// Record waiting on `id`, which must be in `expected` status
    fn correlated(
        &mut self,
        id: u64,
        expected: SubscriptionStatus,
        what: &str,
        document: &Value,
    ) -> &mut SubscriptionRecord {
        let Some(record) = self.registry.find_by_request_mut(id) else {
            panic!("Got unexpected {}: {}", what, document);
        };
        assert_eq!(
            record.status, expected,
            "Got {} for subscription {} in status {}",
            what, record.channel, record.status
        );
        record
    }

    fn accepts_requests(&self, operation: &str) -> bool {
        match self.state {
            SessionState::Running if !self.reading => {
                tracing::warn!(
                    client_id = self.client_id,
                    operation = operation,
                    "RTM session has halted, dropping request"
                );
                false
            }
            SessionState::Running => true,
            SessionState::PendingStopped => {
                tracing::debug!(operation = operation, "RTM client is pending stop");
                false
            }
            SessionState::Stopped => panic!("RTM client is not running ({})", operation),
        }
    }

    fn next_request_id(&mut self) -> u64 {
        self.request_id += 1;
        self.request_id
    }

    /// Queue a document for the writer; returns its size in bytes
    fn write(&mut self, document: &Value) -> usize {
        let text = document.to_string();
        let size = text.len();

        if let Some(outbound) = &self.outbound {
            if outbound.send(Outbound::Text(text)).is_err() {
                tracing::debug!(client_id = self.client_id, "Writer is gone, dropping frame");
            }
        }

        size
    }

    fn report(&self, error: ClientError) -> Vec<Notification> {
        vec![Notification::Error {
            callbacks: Arc::clone(&self.callbacks),
            error,
        }]
    }

    /// Report a connection-fatal error, at most once per session
    fn fatal(&mut self, error: ClientError) -> Vec<Notification> {
        if self.fatal_reported {
            tracing::debug!(client_id = self.client_id, error = %error, "Suppressing repeated fatal error");
            return Vec::new();
        }
        self.fatal_reported = true;
        self.report(error)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::testing::RecordingCallbacks;

    struct Harness {
        core: SessionCore,
        outbound: mpsc::UnboundedReceiver<Outbound>,
        errors: Arc<RecordingCallbacks>,
        data: Arc<RecordingCallbacks>,
    }

    impl Harness {
        fn running() -> Self {
            let errors = Arc::new(RecordingCallbacks::default());
            let mut core = SessionCore::new(1, errors.clone());
            let (tx, outbound) = mpsc::unbounded_channel();
            core.on_started(tx);

            Self {
                core,
                outbound,
                errors,
                data: Arc::new(RecordingCallbacks::default()),
            }
        }

        fn subscribe(&mut self, channel: &str) -> Subscription {
            let sub = Subscription::new();
            self.core.subscribe(channel, sub, self.data.clone(), None);
            sub
        }

        fn feed(&mut self, document: Value) {
            match self.core.on_frame(document.to_string().as_bytes()) {
                ReadOutcome::Continue(notifications) => dispatch_all(notifications),
                ReadOutcome::Halt(_) => panic!("unexpected halt"),
            }
        }

        fn sent(&mut self) -> Vec<Value> {
            let mut documents = Vec::new();
            while let Ok(item) = self.outbound.try_recv() {
                if let Outbound::Text(text) = item {
                    documents.push(serde_json::from_str(&text).unwrap());
                }
            }
            documents
        }

        fn status(&self, channel: &str) -> Option<SubscriptionStatus> {
            self.core.registry().get(channel).map(|r| r.status)
        }

        fn confirm(&mut self, channel: &str) -> Subscription {
            let sub = self.subscribe(channel);
            let id = self.core.registry().get(channel).unwrap().pending_request_id.unwrap();
            self.feed(json!({ "action": "rtm/subscribe/ok", "id": id, "body": {} }));
            sub
        }
    }

    fn data(channel: &str, messages: Value) -> Value {
        json!({
            "action": "rtm/subscription/data",
            "body": { "subscription_id": channel, "messages": messages },
        })
    }

    #[test]
    fn test_subscribe_writes_request() {
        let mut h = Harness::running();
        let sub = Subscription::new();
        let options = SubscriptionOptions::new().history_count(3);
        h.core.subscribe("cars", sub, h.data.clone(), Some(&options));

        let sent = h.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["action"], "rtm/subscribe");
        assert_eq!(sent[0]["id"], 1);
        assert_eq!(sent[0]["body"]["history"], json!({ "count": 3 }));
        assert_eq!(h.status("cars"), Some(SubscriptionStatus::PendingSubscribe));
    }

    #[test]
    fn test_request_ids_increase() {
        let mut h = Harness::running();
        let a = h.subscribe("a");
        h.subscribe("b");
        h.core.unsubscribe(a);

        let ids: Vec<u64> = h.sent().iter().map(|d| d["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_subscribe_ok_confirms() {
        let mut h = Harness::running();
        h.confirm("cars");

        assert_eq!(h.status("cars"), Some(SubscriptionStatus::Current));
        assert_eq!(h.core.registry().get("cars").unwrap().pending_request_id, None);
    }

    #[test]
    #[should_panic(expected = "Got unexpected subscribe confirmation")]
    fn test_subscribe_ok_with_wrong_id_is_fatal() {
        let mut h = Harness::running();
        h.subscribe("cars");

        h.feed(json!({ "action": "rtm/subscribe/ok", "id": 99 }));
    }

    #[test]
    fn test_subscribe_ok_with_wrong_id_leaves_record_pending() {
        let mut h = Harness::running();
        h.subscribe("cars");

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            h.feed(json!({ "action": "rtm/subscribe/ok", "id": 99 }));
        }));

        assert!(result.is_err());
        assert_eq!(h.status("cars"), Some(SubscriptionStatus::PendingSubscribe));
    }

    #[test]
    fn test_data_delivered_in_order() {
        let mut h = Harness::running();
        let sub = h.confirm("cars");

        h.feed(data("cars", json!([1, 2, 3])));

        assert_eq!(
            h.data.data(),
            vec![(sub, json!(1)), (sub, json!(2)), (sub, json!(3))]
        );
        assert_eq!(h.core.stats().channel("cars").unwrap().messages_received, 1);
    }

    #[test]
    #[should_panic(expected = "Got data for unconfirmed subscription")]
    fn test_data_for_pending_subscribe_is_fatal() {
        let mut h = Harness::running();
        h.subscribe("cars");

        h.feed(data("cars", json!([1])));
    }

    #[test]
    #[should_panic(expected = "Got data for unknown subscription")]
    fn test_data_for_unknown_subscription_is_fatal() {
        let mut h = Harness::running();

        h.feed(data("cars", json!([1])));
    }

    #[test]
    fn test_data_for_pending_unsubscribe_is_dropped() {
        let mut h = Harness::running();
        let sub = h.confirm("cars");
        h.core.unsubscribe(sub);

        h.feed(data("cars", json!([1, 2])));

        assert!(h.data.data().is_empty());
        assert_eq!(h.status("cars"), Some(SubscriptionStatus::PendingUnsubscribe));
    }

    #[test]
    fn test_unsubscribe_ok_removes_record() {
        let mut h = Harness::running();
        let sub = h.confirm("cars");
        h.sent();
        h.core.unsubscribe(sub);

        let sent = h.sent();
        assert_eq!(sent[0]["action"], "rtm/unsubscribe");
        assert_eq!(sent[0]["body"]["subscription_id"], "cars");
        let id = sent[0]["id"].as_u64().unwrap();

        h.feed(json!({ "action": "rtm/unsubscribe/ok", "id": id }));
        assert!(h.core.registry().is_empty());
    }

    #[test]
    #[should_panic(expected = "Got unexpected unsubscribe confirmation")]
    fn test_repeated_unsubscribe_ok_is_fatal() {
        let mut h = Harness::running();
        let sub = h.confirm("cars");
        h.core.unsubscribe(sub);
        let id = h.core.registry().get("cars").unwrap().pending_request_id.unwrap();

        h.feed(json!({ "action": "rtm/unsubscribe/ok", "id": id }));
        h.feed(json!({ "action": "rtm/unsubscribe/ok", "id": id }));
    }

    #[test]
    fn test_subscribe_error_reports_and_removes() {
        let mut h = Harness::running();
        h.subscribe("cars");

        h.feed(json!({ "action": "rtm/subscribe/error", "id": 1, "body": { "error": "denied" } }));

        assert_eq!(h.errors.errors(), vec![ClientError::SubscribeError]);
        assert!(h.core.registry().is_empty());
    }

    #[test]
    fn test_unsubscribe_error_reports_and_removes() {
        let mut h = Harness::running();
        let sub = h.confirm("cars");
        h.core.unsubscribe(sub);

        h.feed(json!({ "action": "rtm/unsubscribe/error", "id": 2 }));

        assert_eq!(h.errors.errors(), vec![ClientError::UnsubscribeError]);
        assert!(h.core.registry().is_empty());
    }

    #[test]
    #[should_panic(expected = "Got subscribe confirmation for subscription cars in status")]
    fn test_subscribe_ok_for_pending_unsubscribe_is_fatal() {
        let mut h = Harness::running();
        let sub = h.confirm("cars");
        h.core.unsubscribe(sub);

        h.feed(json!({ "action": "rtm/subscribe/ok", "id": 2 }));
    }

    #[test]
    fn test_subscription_error_reported_without_lookup() {
        let mut h = Harness::running();

        h.feed(json!({ "action": "rtm/subscription/error", "body": { "channel": "nowhere" } }));

        assert_eq!(h.errors.errors(), vec![ClientError::SubscriptionError]);
    }

    #[test]
    #[should_panic(expected = "Unsupported action")]
    fn test_unknown_action_is_fatal() {
        let mut h = Harness::running();

        h.feed(json!({ "action": "rtm/search/data", "body": {} }));
    }

    #[test]
    fn test_parse_failure_halts_with_invalid_message() {
        let mut h = Harness::running();

        let notifications = match h.core.on_frame(b"{garbage") {
            ReadOutcome::Halt(notifications) => notifications,
            ReadOutcome::Continue(_) => panic!("expected halt"),
        };
        dispatch_all(notifications);

        assert_eq!(h.errors.errors(), vec![ClientError::InvalidMessageError]);
    }

    #[test]
    fn test_fatal_error_reported_once() {
        let mut h = Harness::running();

        dispatch_all(h.core.on_ping_failed("broken pipe"));
        dispatch_all(h.core.on_transport_error("connection reset"));

        assert_eq!(h.errors.errors(), vec![ClientError::TransportError]);
    }

    #[test]
    fn test_publish_while_pending_stopped_is_noop() {
        let mut h = Harness::running();
        h.core.begin_stop();
        assert_eq!(h.core.state(), SessionState::PendingStopped);

        h.core.publish("cars", json!({ "speed": 1 }));

        assert!(h.sent().is_empty());
        assert!(h.core.stats().channel("cars").is_none());
    }

    #[test]
    #[should_panic(expected = "RTM client is not running")]
    fn test_publish_while_stopped_is_fatal() {
        let mut core = SessionCore::new(1, Arc::new(RecordingCallbacks::default()));

        core.publish("cars", json!(1));
    }

    #[test]
    fn test_publish_writes_request() {
        let mut h = Harness::running();

        h.core.publish("cars", json!({ "speed": 1 }));

        let sent = h.sent();
        assert_eq!(sent[0]["action"], "rtm/publish");
        assert_eq!(sent[0]["body"]["message"], json!({ "speed": 1 }));
        assert_eq!(h.core.stats().channel("cars").unwrap().messages_sent, 1);
    }

    #[test]
    #[should_panic(expected = "Duplicate subscribe to cars")]
    fn test_duplicate_subscribe_is_fatal() {
        let mut h = Harness::running();
        h.subscribe("cars");
        h.subscribe("cars");
    }

    #[test]
    #[should_panic(expected = "Didn't find subscription to remove")]
    fn test_unsubscribe_unknown_handle_is_fatal() {
        let mut h = Harness::running();
        h.subscribe("cars");

        h.core.unsubscribe(Subscription::new());
    }

    #[test]
    fn test_stop_clears_registry_when_read_loop_finishes() {
        let mut h = Harness::running();
        h.confirm("cars");
        h.subscribe("boats");

        h.core.begin_stop();
        assert_eq!(h.core.registry().len(), 2);

        h.core.finish_stop();
        assert_eq!(h.core.state(), SessionState::Stopped);
        assert!(h.core.registry().is_empty());
    }

    #[test]
    fn test_stop_after_read_loop_halted_finishes_immediately() {
        let mut h = Harness::running();
        h.subscribe("cars");
        h.core.on_transport_error("connection reset");

        h.core.begin_stop();

        assert_eq!(h.core.state(), SessionState::Stopped);
        assert!(h.core.registry().is_empty());
    }

    #[test]
    fn test_transport_error_while_stopping_completes_stop() {
        let mut h = Harness::running();
        h.core.begin_stop();

        let notifications = h.core.on_transport_error("connection closed");

        assert!(notifications.is_empty());
        assert_eq!(h.core.state(), SessionState::Stopped);
        assert!(h.errors.errors().is_empty());
    }

    #[test]
    #[should_panic(expected = "already started once")]
    fn test_session_is_single_use() {
        let mut h = Harness::running();
        h.core.begin_stop();
        h.core.finish_stop();

        h.core.check_startable();
    }

    #[test]
    fn test_control_frames_update_stats_only() {
        let mut h = Harness::running();

        h.core.on_control_frame(ControlFrame::Pong);
        h.core.on_control_frame(ControlFrame::Close);

        assert_eq!(h.core.stats().frames_received[&ControlFrame::Pong], 1);
        assert!(h.core.stats().last_pong_time.is_some());
        assert_eq!(h.core.state(), SessionState::Running);
        assert!(h.errors.errors().is_empty());
    }

    #[test]
    fn test_contract_violation_halts_and_reports_once() {
        let mut h = Harness::running();
        h.confirm("cars");
        h.sent();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            h.feed(json!({ "action": "rtm/future/thing" }));
        }));
        assert!(result.is_err());

        dispatch_all(h.core.on_contract_violation("Unsupported action"));
        dispatch_all(h.core.on_transport_error("connection shut down"));
        assert_eq!(h.errors.errors(), vec![ClientError::InvalidResponse]);

        h.core.publish("cars", json!(1));
        assert!(h.sent().is_empty());

        h.core.begin_stop();
        assert_eq!(h.core.state(), SessionState::Stopped);
        assert!(h.core.registry().is_empty());
    }

    #[test]
    fn test_contract_violation_while_stopping_completes_stop() {
        let mut h = Harness::running();
        h.core.begin_stop();

        let notifications = h.core.on_contract_violation("Got data for unknown subscription");

        assert!(notifications.is_empty());
        assert_eq!(h.core.state(), SessionState::Stopped);
    }
}
