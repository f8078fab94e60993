//! S³I broker events.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The fixed `messageType` tag of every event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventMessageType {
    #[default]
    #[serde(rename = "eventMessage")]
    EventMessage,
}

/// An event published on a topic and delivered to an event queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3iEvent {
    pub sender: String,
    pub identifier: String,
    /// Unix timestamp (seconds) of the event.
    pub timestamp: i64,
    /// Free-form topic, used by handlers to decide whether they are suited.
    pub topic: String,
    #[serde(rename = "messageType", default)]
    pub message_type: EventMessageType,
    pub content: Value,
}

impl S3iEvent {
    pub fn new(
        sender: impl Into<String>,
        identifier: impl Into<String>,
        topic: impl Into<String>,
        content: Value,
    ) -> Self {
        Self {
            sender: sender.into(),
            identifier: identifier.into(),
            timestamp: time::OffsetDateTime::now_utc().unix_timestamp(),
            topic: topic.into(),
            message_type: EventMessageType::EventMessage,
            content,
        }
    }
}

impl fmt::Display for S3iEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "event {} on '{}' from {}",
            self.identifier, self.topic, self.sender
        )
    }
}
