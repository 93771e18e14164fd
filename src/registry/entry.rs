//! Subscription record and status types

use std::sync::Arc;
use std::time::Instant;

use crate::client::{Subscription, SubscriptionCallbacks};

/// Status of a subscription record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// Subscribe request sent, waiting for the server
    PendingSubscribe,
    /// Confirmed; data is delivered
    Current,
    /// Unsubscribe request sent; in-flight data is dropped
    PendingUnsubscribe,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SubscriptionStatus::PendingSubscribe => "pending_subscribe",
            SubscriptionStatus::Current => "current",
            SubscriptionStatus::PendingUnsubscribe => "pending_unsubscribe",
        };
        f.write_str(name)
    }
}

/// Entry for a single channel in the registry
pub struct SubscriptionRecord {
    /// Channel name, also used as the wire subscription id
    pub channel: String,

    /// Caller's handle
    pub subscription: Subscription,

    /// Receiver for this subscription's data
    pub callbacks: Arc<dyn SubscriptionCallbacks>,

    pub status: SubscriptionStatus,

    /// Request the record is waiting on, if any
    pub pending_request_id: Option<u64>,

    /// When the subscribe request was issued
    pub created_at: Instant,
}

impl SubscriptionRecord {
    /// Create a record for a freshly issued subscribe request
    pub fn pending(
        channel: impl Into<String>,
        subscription: Subscription,
        callbacks: Arc<dyn SubscriptionCallbacks>,
        request_id: u64,
    ) -> Self {
        Self {
            channel: channel.into(),
            subscription,
            callbacks,
            status: SubscriptionStatus::PendingSubscribe,
            pending_request_id: Some(request_id),
            created_at: Instant::now(),
        }
    }

    /// Mark the subscribe request as confirmed
    pub fn confirm(&mut self) {
        self.pending_request_id = None;
        self.status = SubscriptionStatus::Current;
    }

    /// Mark an unsubscribe request as sent
    pub fn begin_unsubscribe(&mut self, request_id: u64) {
        self.pending_request_id = Some(request_id);
        self.status = SubscriptionStatus::PendingUnsubscribe;
    }
}

impl std::fmt::Debug for SubscriptionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRecord")
            .field("channel", &self.channel)
            .field("subscription", &self.subscription)
            .field("status", &self.status)
            .field("pending_request_id", &self.pending_request_id)
            .finish_non_exhaustive()
    }
}
