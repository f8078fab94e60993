//! Device status events.

use anyhow::Context;
use async_trait::async_trait;
use expco_sdk::objects::S3iEvent;
use kanau::processor::Processor;
use serde::Deserialize;
use tracing::info;

use crate::entities::statuses::InsertStatus;
use crate::framework::DatabaseProcessor;
use crate::processors::Handler;

/// Content of a status event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusEventContent {
    pub status_name: String,
    #[serde(default)]
    pub status_error_detail: String,
    #[serde(default)]
    pub status_error_source: String,
    #[serde(default)]
    pub status_error_text: String,
}

pub struct StatusHandler {
    db: DatabaseProcessor,
    topic: String,
}

impl StatusHandler {
    pub const NAME: &'static str = "status";

    pub fn new(db: DatabaseProcessor, topic: impl Into<String>) -> Self {
        Self {
            db,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl Handler<S3iEvent> for StatusHandler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn matches(&self, event: &S3iEvent) -> bool {
        event.topic == self.topic
    }

    async fn run(&self, event: &S3iEvent) -> anyhow::Result<()> {
        let content = StatusEventContent::deserialize(&event.content)
            .context("invalid status event content")?;
        let sent_at = time::OffsetDateTime::from_unix_timestamp(event.timestamp)
            .context("status event timestamp out of range")?;
        let device = self.db.resolve_device(&event.sender).await?;

        let status = self
            .db
            .process(InsertStatus {
                device_id: device.id,
                status_name: content.status_name,
                status_error_detail: content.status_error_detail,
                status_error_source: content.status_error_source,
                status_error_text: content.status_error_text,
                sent_at,
            })
            .await?;

        info!(
            device = %device.name,
            status = %status.status_name,
            id = status.id,
            "Status event saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_defaults() {
        let content =
            StatusEventContent::deserialize(&json!({"status_name": "watering"})).unwrap();
        assert_eq!(content.status_name, "watering");
        assert_eq!(content.status_error_detail, "");
        assert_eq!(content.status_error_source, "");
        assert_eq!(content.status_error_text, "");

        assert!(StatusEventContent::deserialize(&json!({"status_error_text": "x"})).is_err());
    }

    #[tokio::test]
    async fn test_matches_configured_topic_only() {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/expco").unwrap();
        let handler = StatusHandler::new(DatabaseProcessor::new(pool), "lab_status");

        let on = S3iEvent::new("s3i:a", "e-1", "lab_status", json!({}));
        let off = S3iEvent::new("s3i:a", "e-2", "plant-growth-observation_status", json!({}));
        assert!(handler.matches(&on));
        assert!(!handler.matches(&off));
    }
}
