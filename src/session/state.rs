//! Session lifecycle state

use std::fmt;

/// Lifecycle state of a transport session
///
/// ```text
/// Stopped ──start()──► Running ──stop()──► PendingStopped ──read loop──► Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected. Initial state, and final state after a stop.
    Stopped,
    /// Connected and serving requests
    Running,
    /// Stop requested, waiting for the read loop to wind down
    PendingStopped,
}

impl SessionState {
    /// Check if requests are currently served
    pub fn is_running(&self) -> bool {
        *self == SessionState::Running
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Stopped => "stopped",
            SessionState::Running => "running",
            SessionState::PendingStopped => "pending_stopped",
        };
        f.write_str(name)
    }
}
