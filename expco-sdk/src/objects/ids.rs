//! S3I identifiers and queue names.
//!
//! All three types validate on construction and on deserialization, so a
//! value that made it into a config struct or a message is well-formed.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const ID_PREFIX: &str = "s3i:";
const MESSAGE_QUEUE_PREFIX: &str = "s3ibs://";
const EVENT_QUEUE_PREFIX: &str = "s3ib://";
const EVENT_QUEUE_SUFFIX: &str = "/event";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("S3I ID must start with 's3i:'")]
    MissingIdPrefix,
    #[error("S3I ID must end with a valid UUID")]
    InvalidUuid,
    #[error("S3I message queue must start with 's3ibs://'")]
    MissingMessageQueuePrefix,
    #[error("S3I event queue must start with 's3ib://'")]
    MissingEventQueuePrefix,
    #[error("S3I event queue must end with '/event'")]
    MissingEventQueueSuffix,
}

/// An S3I identity, e.g. `s3i:123e4567-e89b-12d3-a456-426614174000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct S3iId(CompactString);

impl S3iId {
    pub fn uuid(&self) -> Uuid {
        // Validated in `from_str`, the fallback is unreachable.
        Uuid::parse_str(&self.0[ID_PREFIX.len()..]).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for S3iId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = s.strip_prefix(ID_PREFIX).ok_or(IdError::MissingIdPrefix)?;
        Uuid::parse_str(uuid).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(CompactString::from(s)))
    }
}

impl From<Uuid> for S3iId {
    fn from(value: Uuid) -> Self {
        Self(compact_str::format_compact!("{ID_PREFIX}{value}"))
    }
}

/// Message queue of an S3I identity, `s3ibs://<S3iId>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageQueue(CompactString);

impl MessageQueue {
    pub fn owner(&self) -> Result<S3iId, IdError> {
        self.0[MESSAGE_QUEUE_PREFIX.len()..].parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MessageQueue {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .strip_prefix(MESSAGE_QUEUE_PREFIX)
            .ok_or(IdError::MissingMessageQueuePrefix)?;
        id.parse::<S3iId>()?;
        Ok(Self(CompactString::from(s)))
    }
}

impl From<&S3iId> for MessageQueue {
    fn from(id: &S3iId) -> Self {
        Self(compact_str::format_compact!("{MESSAGE_QUEUE_PREFIX}{id}"))
    }
}

/// Event queue of an S3I identity, `s3ib://<S3iId>/event`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventQueue(CompactString);

impl EventQueue {
    pub fn owner(&self) -> Result<S3iId, IdError> {
        let end = self.0.len() - EVENT_QUEUE_SUFFIX.len();
        self.0[EVENT_QUEUE_PREFIX.len()..end].parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for EventQueue {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(EVENT_QUEUE_PREFIX)
            .ok_or(IdError::MissingEventQueuePrefix)?;
        let id = rest
            .strip_suffix(EVENT_QUEUE_SUFFIX)
            .ok_or(IdError::MissingEventQueueSuffix)?;
        id.parse::<S3iId>()?;
        Ok(Self(CompactString::from(s)))
    }
}

impl From<&S3iId> for EventQueue {
    fn from(id: &S3iId) -> Self {
        Self(compact_str::format_compact!(
            "{EVENT_QUEUE_PREFIX}{id}{EVENT_QUEUE_SUFFIX}"
        ))
    }
}

macro_rules! string_newtype_impls {
    ($($ty:ty),*) => {$(
        impl TryFrom<String> for $ty {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0.into()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    )*};
}

string_newtype_impls!(S3iId, MessageQueue, EventQueue);

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "s3i:123e4567-e89b-12d3-a456-426614174000";

    #[test]
    fn test_parse_id() {
        let id: S3iId = ID.parse().unwrap();
        assert_eq!(id.as_str(), ID);
        assert_eq!(
            id.uuid(),
            Uuid::parse_str("123e4567-e89b-12d3-a456-426614174000").unwrap()
        );

        assert_eq!(
            "123e4567-e89b-12d3-a456-426614174000".parse::<S3iId>(),
            Err(IdError::MissingIdPrefix)
        );
        assert_eq!("s3i:not-a-uuid".parse::<S3iId>(), Err(IdError::InvalidUuid));
    }

    #[test]
    fn test_parse_queues() {
        let message_queue: MessageQueue = format!("s3ibs://{ID}").parse().unwrap();
        assert_eq!(message_queue.owner().unwrap().as_str(), ID);

        let event_queue: EventQueue = format!("s3ib://{ID}/event").parse().unwrap();
        assert_eq!(event_queue.owner().unwrap().as_str(), ID);

        assert_eq!(
            format!("s3ib://{ID}").parse::<MessageQueue>(),
            Err(IdError::MissingMessageQueuePrefix)
        );
        assert_eq!(
            format!("s3ib://{ID}").parse::<EventQueue>(),
            Err(IdError::MissingEventQueueSuffix)
        );
        assert_eq!(
            "s3ib://s3i:nope/event".parse::<EventQueue>(),
            Err(IdError::InvalidUuid)
        );
    }

    #[test]
    fn test_queues_from_id() {
        let id: S3iId = ID.parse().unwrap();
        assert_eq!(
            MessageQueue::from(&id).as_str(),
            format!("s3ibs://{ID}").as_str()
        );
        assert_eq!(
            EventQueue::from(&id).as_str(),
            format!("s3ib://{ID}/event").as_str()
        );
    }

    #[test]
    fn test_deserialize_rejects_invalid() {
        let ok: S3iId = serde_json::from_str(&format!("\"{ID}\"")).unwrap();
        assert_eq!(ok.as_str(), ID);
        assert!(serde_json::from_str::<S3iId>("\"s3i:xyz\"").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), format!("\"{ID}\""));
    }
}
