//! Transport session client

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::machine::SessionCore;
use super::state::SessionState;
use super::transport::{self, SharedCore};
use crate::client::{
    ChannelPosition, Client, ClientConfig, ErrorCallbacks, PublishCallbacks, Subscription,
    SubscriptionCallbacks, SubscriptionOptions,
};
use crate::error::{ClientError, Result};
use crate::registry::SubscriptionStatus;
use crate::stats::ClientStats;

/// Tasks of a started session
struct SessionTasks {
    shutdown: CancellationToken,
    reader: JoinHandle<()>,
}

/// RTM client owning a single websocket connection
///
/// An instance runs at most once: after it stops, build a new one. Errors
/// that end the connection are reported once through the callbacks given
/// at construction, after which the session stays inert until stopped.
pub struct SecureClient {
    config: ClientConfig,
    core: SharedCore,
    tasks: Mutex<Option<SessionTasks>>,
}

impl SecureClient {
    pub fn new(config: ClientConfig, callbacks: Arc<dyn ErrorCallbacks>) -> Self {
        let core = SessionCore::new(config.client_id, callbacks);
        Self {
            config,
            core: Arc::new(Mutex::new(core)),
            tasks: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.core.lock().state()
    }

    /// Number of live subscription records
    pub fn subscription_count(&self) -> usize {
        self.core.lock().registry().len()
    }

    /// Status of the record for `channel`, if any
    pub fn subscription_status(&self, channel: &str) -> Option<SubscriptionStatus> {
        self.core.lock().registry().get(channel).map(|r| r.status)
    }

    /// Snapshot of the session's traffic counters
    pub fn stats(&self) -> ClientStats {
        self.core.lock().stats().clone()
    }
}

#[async_trait]
impl Client for SecureClient {
    async fn start(&self) -> Result<()> {
        self.core.lock().check_startable();

        tracing::info!(
            client_id = self.config.client_id,
            host = %self.config.host,
            port = self.config.port,
            secure = self.config.secure,
            "Starting RTM client"
        );

        let connect = transport::connect(&self.config);
        let stream = match tokio::time::timeout(self.config.connect_timeout, connect).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::error!(
                    client_id = self.config.client_id,
                    host = %self.config.host,
                    timeout = ?self.config.connect_timeout,
                    "Websocket connect timed out"
                );
                return Err(ClientError::TransportError);
            }
        };

        let (sink, stream) = stream.split();
        let (outbound, queue) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        self.core.lock().on_started(outbound.clone());

        tokio::spawn(transport::write_loop(sink, queue, shutdown.clone()));
        tokio::spawn(transport::keepalive_loop(
            outbound,
            Arc::clone(&self.core),
            self.config.ping_interval,
            shutdown.clone(),
        ));
        let reader = tokio::spawn(transport::read_loop(
            stream,
            Arc::clone(&self.core),
            shutdown.clone(),
        ));

        *self.tasks.lock() = Some(SessionTasks { shutdown, reader });

        tracing::info!(client_id = self.config.client_id, "RTM client started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        tracing::info!(client_id = self.config.client_id, "Stopping RTM client");
        self.core.lock().begin_stop();

        let tasks = self.tasks.lock().take();
        if let Some(tasks) = tasks {
            tasks.shutdown.cancel();
            if let Err(e) = tasks.reader.await {
                tracing::error!(
                    client_id = self.config.client_id,
                    error = %e,
                    "Read loop ended abnormally"
                );
            }
        }

        // A reader that died without observing the stop leaves it pending
        {
            let mut core = self.core.lock();
            if core.state() == SessionState::PendingStopped {
                core.finish_stop();
            }
        }

        Ok(())
    }

    fn publish(&self, channel: &str, message: Value, callbacks: Option<Arc<dyn PublishCallbacks>>) {
        assert!(
            callbacks.is_none(),
            "publish acknowledgements are not implemented"
        );
        self.core.lock().publish(channel, message);
    }

    fn subscribe(
        &self,
        channel: &str,
        subscription: Subscription,
        callbacks: Arc<dyn SubscriptionCallbacks>,
        options: Option<SubscriptionOptions>,
    ) {
        self.core
            .lock()
            .subscribe(channel, subscription, callbacks, options.as_ref());
    }

    fn unsubscribe(&self, subscription: Subscription) {
        self.core.lock().unsubscribe(subscription);
    }

    fn position(&self, _subscription: Subscription) -> Result<ChannelPosition> {
        Err(ClientError::NotSupported)
    }

    fn is_up(&self, _subscription: Subscription) -> Result<bool> {
        Err(ClientError::NotSupported)
    }
}

impl Drop for SecureClient {
    fn drop(&mut self) {
        {
            let mut core = self.core.lock();
            if core.state().is_running() {
                core.begin_stop();
            }
        }

        if let Some(tasks) = self.tasks.get_mut().take() {
            tasks.shutdown.cancel();
        }
    }
}
