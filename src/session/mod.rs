//! Transport session
//!
//! [`SecureClient`] owns one websocket connection and drives the protocol
//! state machine over it:
//!
//! ```text
//! Stopped ──start()──► Running ──stop()──► PendingStopped ──read loop ends──► Stopped
//! ```
//!
//! A session instance is single-use; reconnecting means building a new one,
//! which is what [`ResilientClient`](crate::client::ResilientClient) does.

mod machine;
pub mod secure;
pub mod state;
mod transport;

pub use secure::SecureClient;
pub use state::SessionState;
