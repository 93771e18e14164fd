//! Client configuration

use std::time::Duration;

use url::form_urlencoded;

use crate::protocol::constants::*;

/// Client configuration options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host name
    pub host: String,

    /// Server port
    pub port: u16,

    /// Application key sent in the upgrade request
    pub appkey: String,

    /// Identifier of this client instance, used in logs
    pub client_id: u64,

    /// Use TLS (`wss`). Plain `ws` is only meant for local testing.
    pub secure: bool,

    /// Interval between keepalive pings
    pub ping_interval: Duration,

    /// Largest inbound message accepted
    pub max_message_size: usize,

    /// Resolve + connect + handshakes must complete within this time
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Create a config for `host:port` with default settings
    pub fn new(host: impl Into<String>, port: u16, appkey: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            appkey: appkey.into(),
            client_id: 0,
            secure: true,
            ping_interval: DEFAULT_PING_INTERVAL,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Enable or disable TLS
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the client id
    pub fn client_id(mut self, id: u64) -> Self {
        self.client_id = id;
        self
    }

    /// Set keepalive ping interval
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set maximum inbound message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Websocket URL including the upgrade path and application key
    ///
    /// The appkey is form-encoded so reserved characters stay inside the
    /// query value.
    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("appkey", &self.appkey)
            .finish();
        format!(
            "{}://{}:{}{}?{}",
            scheme, self.host, self.port, UPGRADE_PATH, query
        )
    }
}
