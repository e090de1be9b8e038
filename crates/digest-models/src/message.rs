//! Scraped channel messages.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A single text message pulled from a channel.
///
/// Persisted artifacts are pretty-printed JSON arrays of these records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Channel the message was posted in.
    pub channel_name: String,
    /// Message id within the channel.
    pub message_id: i64,
    /// Publication time, serialized as RFC 3339.
    pub publication_date: DateTime<FixedOffset>,
    /// Message text.
    pub text: String,
}

impl MessageRecord {
    /// Creates a new message record.
    pub fn new(
        channel_name: impl Into<String>,
        message_id: i64,
        publication_date: DateTime<FixedOffset>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel_name: channel_name.into(),
            message_id,
            publication_date,
            text: text.into(),
        }
    }

    /// Whether the record carries any non-whitespace text.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}
