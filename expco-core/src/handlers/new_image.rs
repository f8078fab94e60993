//! New image events from camera devices.

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use expco_sdk::objects::S3iEvent;
use kanau::processor::Processor;
use serde::Deserialize;
use tracing::info;

use crate::entities::images::InsertImage;
use crate::framework::DatabaseProcessor;
use crate::processors::Handler;

/// URL-safe alphabet, padding optional.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The only content type cameras send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ImageContentType {
    #[serde(rename = "image/jpeg; encoding=base64url")]
    JpegBase64Url,
}

impl ImageContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageContentType::JpegBase64Url => "image/jpeg; encoding=base64url",
        }
    }
}

/// Content of a new image event.
#[derive(Clone, Deserialize)]
pub struct NewImageEventContent {
    #[serde(rename = "type")]
    pub content_type: ImageContentType,
    pub path: String,
    /// Unix timestamp (seconds).
    #[serde(rename = "takenAt")]
    pub taken_at: i64,
    /// base64url encoded JPEG.
    pub image: String,
}

impl NewImageEventContent {
    pub fn decode_image(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64URL.decode(self.image.trim())
    }
}

impl std::fmt::Debug for NewImageEventContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewImageEventContent")
            .field("content_type", &self.content_type)
            .field("path", &self.path)
            .field("taken_at", &self.taken_at)
            .finish_non_exhaustive()
    }
}

pub struct NewImageHandler {
    db: DatabaseProcessor,
    topic: String,
}

impl NewImageHandler {
    pub const NAME: &'static str = "new_image";

    pub fn new(db: DatabaseProcessor, topic: impl Into<String>) -> Self {
        Self {
            db,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl Handler<S3iEvent> for NewImageHandler {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn matches(&self, event: &S3iEvent) -> bool {
        event.topic == self.topic
    }

    async fn run(&self, event: &S3iEvent) -> anyhow::Result<()> {
        let content = NewImageEventContent::deserialize(&event.content)
            .context("invalid new image event content")?;
        let data = content
            .decode_image()
            .context("image is not valid base64url")?;
        let taken_at = time::OffsetDateTime::from_unix_timestamp(content.taken_at)
            .context("takenAt out of range")?;
        let device = self.db.resolve_device(&event.sender).await?;

        let size = data.len();
        let id = self
            .db
            .process(InsertImage {
                device_id: device.id,
                path: content.path,
                content_type: content.content_type.as_str().to_string(),
                taken_at,
                data,
            })
            .await?;

        info!(device = %device.name, id, size, "Image saved");
        Ok(())
    }
}
