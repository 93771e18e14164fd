//! RTM protocol constants

use std::time::Duration;

/// Websocket upgrade path; the application key goes in the query string
pub const UPGRADE_PATH: &str = "/v2";

/// Default interval between websocket pings
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(60);

/// Payload carried by keepalive pings
pub const PING_PAYLOAD: &[u8] = b"pingmsg";

/// Largest inbound message accepted by default
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 100_000;

// Outbound actions
pub const ACTION_PUBLISH: &str = "rtm/publish";
pub const ACTION_SUBSCRIBE: &str = "rtm/subscribe";
pub const ACTION_UNSUBSCRIBE: &str = "rtm/unsubscribe";

// Inbound actions
pub const ACTION_SUBSCRIPTION_DATA: &str = "rtm/subscription/data";
pub const ACTION_SUBSCRIPTION_ERROR: &str = "rtm/subscription/error";
pub const ACTION_SUBSCRIBE_OK: &str = "rtm/subscribe/ok";
pub const ACTION_SUBSCRIBE_ERROR: &str = "rtm/subscribe/error";
pub const ACTION_UNSUBSCRIBE_OK: &str = "rtm/unsubscribe/ok";
pub const ACTION_UNSUBSCRIBE_ERROR: &str = "rtm/unsubscribe/error";
