//! Registry error types

use crate::client::Subscription;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Channel already has a live record
    AlreadySubscribed(String),
    /// No record is owned by this handle
    UnknownSubscription(Subscription),
    /// Handle already owns a record on another channel
    HandleInUse(Subscription),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::AlreadySubscribed(channel) => {
                write!(f, "Channel already subscribed: {}", channel)
            }
            RegistryError::UnknownSubscription(sub) => write!(f, "Unknown subscription: {}", sub),
            RegistryError::HandleInUse(sub) => write!(f, "Subscription handle in use: {}", sub),
        }
    }
}

impl std::error::Error for RegistryError {}
