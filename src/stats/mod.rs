//! Client statistics

pub mod metrics;

pub use metrics::{ChannelStats, ClientStats, ControlFrame};
