//! Request encoding and response decoding
//!
//! Encoding is infallible: every request is built as a `serde_json::Value`
//! and written with its `Display` impl. Decoding classifies the `action`
//! field into [`Action`] and pulls out the fields the session needs to
//! route the document; anything else in the body is left untouched.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::HistoryOptions;
use crate::error::{ClientError, Result};

use super::constants::*;

/// Build an `rtm/subscribe` request
///
/// The channel name doubles as the subscription id. `history` is only
/// emitted when at least one of its fields is set.
pub fn encode_subscribe(id: u64, channel: &str, history: &HistoryOptions) -> Value {
    let mut body = json!({
        "channel": channel,
        "subscription_id": channel,
    });

    if history.age.is_some() || history.count.is_some() {
        let mut fields = serde_json::Map::new();
        if let Some(age) = history.age {
            fields.insert("age".into(), age.into());
        }
        if let Some(count) = history.count {
            fields.insert("count".into(), count.into());
        }
        body["history"] = Value::Object(fields);
    }

    json!({
        "action": ACTION_SUBSCRIBE,
        "body": body,
        "id": id,
    })
}

/// Build an `rtm/unsubscribe` request
pub fn encode_unsubscribe(id: u64, channel: &str) -> Value {
    json!({
        "action": ACTION_UNSUBSCRIBE,
        "body": { "subscription_id": channel },
        "id": id,
    })
}

/// Build an `rtm/publish` request
///
/// Publishes are fire-and-forget, so no correlation id is attached.
pub fn encode_publish(channel: &str, message: Value) -> Value {
    json!({
        "action": ACTION_PUBLISH,
        "body": {
            "channel": channel,
            "message": message,
        },
    })
}

/// Inbound action, classified by the envelope's `action` field
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Batch of messages for one subscription, in server order
    SubscriptionData {
        subscription_id: String,
        messages: Vec<Value>,
    },
    SubscribeOk { id: u64 },
    SubscribeError { id: u64 },
    UnsubscribeOk { id: u64 },
    UnsubscribeError { id: u64 },
    /// Channel-level fault; carries no correlation id
    SubscriptionError,
    /// Missing or unrecognized action name
    Unsupported(Option<String>),
}

impl Action {
    /// Wire name of the action, used as a statistics key
    pub fn name(&self) -> &str {
        match self {
            Action::SubscriptionData { .. } => ACTION_SUBSCRIPTION_DATA,
            Action::SubscribeOk { .. } => ACTION_SUBSCRIBE_OK,
            Action::SubscribeError { .. } => ACTION_SUBSCRIBE_ERROR,
            Action::UnsubscribeOk { .. } => ACTION_UNSUBSCRIBE_OK,
            Action::UnsubscribeError { .. } => ACTION_UNSUBSCRIBE_ERROR,
            Action::SubscriptionError => ACTION_SUBSCRIPTION_ERROR,
            Action::Unsupported(Some(name)) => name,
            Action::Unsupported(None) => "<none>",
        }
    }
}

/// A decoded inbound document
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub action: Action,
    /// The full document, kept for logging
    pub document: Value,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    action: Option<String>,
    id: Option<u64>,
    #[serde(default)]
    body: Value,
}

#[derive(Debug, Deserialize)]
struct DataBody {
    subscription_id: String,
    #[serde(default)]
    messages: Vec<Value>,
}

/// Parse one inbound frame
///
/// Fails with [`ClientError::ResponseParsingError`] if the bytes are not a
/// JSON object, or if a known action lacks the field needed to route it.
pub fn decode(bytes: &[u8]) -> Result<Inbound> {
    let document: Value =
        serde_json::from_slice(bytes).map_err(|_| ClientError::ResponseParsingError)?;
    if !document.is_object() {
        return Err(ClientError::ResponseParsingError);
    }

    let envelope: Envelope = serde_json::from_value(document.clone())
        .map_err(|_| ClientError::ResponseParsingError)?;
    let id = || envelope.id.ok_or(ClientError::ResponseParsingError);

    let action = match envelope.action.as_deref() {
        Some(ACTION_SUBSCRIPTION_DATA) => {
            let body: DataBody = serde_json::from_value(envelope.body.clone())
                .map_err(|_| ClientError::ResponseParsingError)?;
            Action::SubscriptionData {
                subscription_id: body.subscription_id,
                messages: body.messages,
            }
        }
        Some(ACTION_SUBSCRIBE_OK) => Action::SubscribeOk { id: id()? },
        Some(ACTION_SUBSCRIBE_ERROR) => Action::SubscribeError { id: id()? },
        Some(ACTION_UNSUBSCRIBE_OK) => Action::UnsubscribeOk { id: id()? },
        Some(ACTION_UNSUBSCRIBE_ERROR) => Action::UnsubscribeError { id: id()? },
        Some(ACTION_SUBSCRIPTION_ERROR) => Action::SubscriptionError,
        other => Action::Unsupported(other.map(str::to_owned)),
    };

    Ok(Inbound { action, document })
}
