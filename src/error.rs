//! Error types
//!
//! Every layer of the client reports failures with [`ClientError`]. The
//! variants form a closed taxonomy: each one maps to exactly one message,
//! which is what `Display` prints.

/// Client error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ClientError {
    #[error("unknown error")]
    Unknown,

    #[error("client is not connected")]
    NotConnected,

    #[error("error parsing response")]
    ResponseParsingError,

    #[error("invalid response")]
    InvalidResponse,

    /// Channel-level fault pushed by the server, not tied to a request
    #[error("subscription error")]
    SubscriptionError,

    /// Server rejected a subscribe request
    #[error("subscribe error")]
    SubscribeError,

    /// Server rejected an unsubscribe request
    #[error("unsubscribe error")]
    UnsubscribeError,

    /// Resolve, connect, handshake, read or ping failure
    #[error("transport error")]
    TransportError,

    /// Inbound frame could not be parsed
    #[error("invalid message")]
    InvalidMessageError,

    /// Operation is not provided by this client
    #[error("operation not supported")]
    NotSupported,
}

impl ClientError {
    /// Stable numeric code, suitable for metrics labels and FFI
    pub fn code(self) -> u8 {
        match self {
            ClientError::Unknown => 1,
            ClientError::NotConnected => 2,
            ClientError::ResponseParsingError => 3,
            ClientError::InvalidResponse => 4,
            ClientError::SubscriptionError => 5,
            ClientError::SubscribeError => 6,
            ClientError::UnsubscribeError => 7,
            ClientError::TransportError => 8,
            ClientError::InvalidMessageError => 9,
            ClientError::NotSupported => 10,
        }
    }
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, ClientError>;
