//! Statistics and metrics for RTM sessions
//!
//! Counters are updated by the session as traffic flows and never feed back
//! into its behavior.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Per-channel traffic counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Publish requests written
    pub messages_sent: u64,
    /// Bytes of publish requests written
    pub bytes_sent: u64,
    /// Data batches received
    pub messages_received: u64,
    /// Bytes of data batches received
    pub bytes_received: u64,
}

/// Websocket control frame kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlFrame {
    Close,
    Ping,
    Pong,
}

/// Session-level statistics
#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    /// Total bytes written to the websocket
    pub bytes_written: u64,
    /// Total bytes read from the websocket
    pub bytes_read: u64,
    /// Pings sent
    pub pings_sent: u64,
    /// Unix time (seconds) of the last ping
    pub last_ping_time: Option<u64>,
    /// Unix time (seconds) of the last pong
    pub last_pong_time: Option<u64>,
    /// Inbound control frames by kind
    pub frames_received: HashMap<ControlFrame, u64>,
    /// Inbound documents by action name
    pub actions_received: HashMap<String, u64>,
    /// Traffic per channel
    pub channels: HashMap<String, ChannelStats>,
}

impl ClientStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_write(&mut self, bytes: usize) {
        self.bytes_written += bytes as u64;
    }

    pub fn record_read(&mut self, bytes: usize) {
        self.bytes_read += bytes as u64;
    }

    pub fn record_publish(&mut self, channel: &str, bytes: usize) {
        let stats = self.channel_mut(channel);
        stats.messages_sent += 1;
        stats.bytes_sent += bytes as u64;
        self.record_write(bytes);
    }

    pub fn record_data(&mut self, channel: &str, bytes: usize) {
        let stats = self.channel_mut(channel);
        stats.messages_received += 1;
        stats.bytes_received += bytes as u64;
    }

    pub fn record_action(&mut self, action: &str) {
        *self.actions_received.entry(action.to_owned()).or_default() += 1;
    }

    pub fn record_ping(&mut self) {
        self.pings_sent += 1;
        self.last_ping_time = Some(unix_time());
    }

    pub fn record_control_frame(&mut self, frame: ControlFrame) {
        *self.frames_received.entry(frame).or_default() += 1;
        if frame == ControlFrame::Pong {
            self.last_pong_time = Some(unix_time());
        }
    }

    /// Counters for one channel, if it has seen traffic
    pub fn channel(&self, channel: &str) -> Option<&ChannelStats> {
        self.channels.get(channel)
    }

    fn channel_mut(&mut self, channel: &str) -> &mut ChannelStats {
        self.channels.entry(channel.to_owned()).or_default()
    }
}

fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
