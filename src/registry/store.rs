//! Subscription registry implementation

use std::collections::HashMap;

use super::entry::SubscriptionRecord;
use super::error::RegistryError;
use crate::client::Subscription;

/// Per-session table of subscription records
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    /// Channel name to record
    records: HashMap<String, SubscriptionRecord>,

    /// Secondary index for identity lookups
    handles: HashMap<Subscription, String>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record
    ///
    /// Fails if the channel already has a record, or if the handle already
    /// owns one.
    pub fn insert(&mut self, record: SubscriptionRecord) -> Result<(), RegistryError> {
        if self.records.contains_key(&record.channel) {
            return Err(RegistryError::AlreadySubscribed(record.channel));
        }
        if self.handles.contains_key(&record.subscription) {
            return Err(RegistryError::HandleInUse(record.subscription));
        }

        self.handles
            .insert(record.subscription, record.channel.clone());
        self.records.insert(record.channel.clone(), record);
        Ok(())
    }

    pub fn get(&self, channel: &str) -> Option<&SubscriptionRecord> {
        self.records.get(channel)
    }

    pub fn get_mut(&mut self, channel: &str) -> Option<&mut SubscriptionRecord> {
        self.records.get_mut(channel)
    }

    /// Channel owned by `subscription`
    pub fn channel_of(&self, subscription: Subscription) -> Result<&str, RegistryError> {
        self.handles
            .get(&subscription)
            .map(String::as_str)
            .ok_or(RegistryError::UnknownSubscription(subscription))
    }

    /// Record waiting on `request_id`
    pub fn find_by_request_mut(&mut self, request_id: u64) -> Option<&mut SubscriptionRecord> {
        self.records
            .values_mut()
            .find(|record| record.pending_request_id == Some(request_id))
    }

    /// Remove a record by channel
    pub fn remove(&mut self, channel: &str) -> Option<SubscriptionRecord> {
        let record = self.records.remove(channel)?;
        self.handles.remove(&record.subscription);
        Some(record)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubscriptionRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record without notifying anyone
    pub fn clear(&mut self) {
        self.records.clear();
        self.handles.clear();
    }
}
