//! Channel positions
//!
//! A position is a `(generation, offset)` cursor into a channel's history,
//! written as `"<generation>:<offset>"`. Callers treat it as opaque.

use std::fmt;

/// Cursor into a channel's message history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChannelPosition {
    pub generation: u32,
    pub offset: u64,
}

impl ChannelPosition {
    pub fn new(generation: u32, offset: u64) -> Self {
        Self { generation, offset }
    }

    /// Parse `"<generation>:<offset>"`
    ///
    /// Anything that does not parse cleanly, including numbers outside the
    /// field's range, yields `0:0`.
    pub fn parse(text: &str) -> Self {
        let Some((generation, offset)) = text.split_once(':') else {
            return Self::default();
        };

        match (generation.parse::<u32>(), offset.parse::<u64>()) {
            (Ok(generation), Ok(offset)) => Self { generation, offset },
            _ => Self::default(),
        }
    }
}

impl fmt::Display for ChannelPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.generation, self.offset)
    }
}

impl From<&str> for ChannelPosition {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}
