use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use serde::Serialize;

/// Metadata of an image taken by a camera device. The bytes are fetched
/// separately with [`GetImageData`].
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct ImageRecord {
    pub id: i64,
    pub device_id: i64,
    pub device_name: String,
    /// Path of the image on the camera.
    pub path: String,
    pub content_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub taken_at: time::OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub received_at: time::OffsetDateTime,
    pub size: i64,
}

impl ImageRecord {
    /// File name used when exporting, safe on every file system.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.jpg",
            self.device_name,
            self.taken_at.unix_timestamp(),
            self.id
        )
        .replace([':', '/', '\\'], "_")
    }
}

#[derive(Clone)]
pub struct InsertImage {
    pub device_id: i64,
    pub path: String,
    pub content_type: String,
    pub taken_at: time::OffsetDateTime,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for InsertImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsertImage")
            .field("device_id", &self.device_id)
            .field("path", &self.path)
            .field("content_type", &self.content_type)
            .field("taken_at", &self.taken_at)
            .field("data", &format_args!("{} bytes", self.data.len()))
            .finish()
    }
}

impl Processor<InsertImage> for DatabaseProcessor {
    /// Id of the new image.
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertImage")]
    async fn process(&self, insert: InsertImage) -> Result<i64, sqlx::Error> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO images (device_id, path, content_type, taken_at, data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(insert.device_id)
        .bind(insert.path)
        .bind(insert.content_type)
        .bind(insert.taken_at)
        .bind(insert.data)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListImages;

impl Processor<ListImages> for DatabaseProcessor {
    type Output = Vec<ImageRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListImages")]
    async fn process(&self, _query: ListImages) -> Result<Vec<ImageRecord>, sqlx::Error> {
        sqlx::query_as::<_, ImageRecord>(
            r#"
            SELECT
                i.id,
                i.device_id,
                d.name AS device_name,
                i.path,
                i.content_type,
                i.taken_at,
                i.received_at,
                octet_length(i.data)::bigint AS size
            FROM images i
            JOIN devices d ON d.id = i.device_id
            ORDER BY i.taken_at, i.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetImageData {
    pub id: i64,
}

impl Processor<GetImageData> for DatabaseProcessor {
    type Output = Option<Vec<u8>>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetImageData")]
    async fn process(&self, query: GetImageData) -> Result<Option<Vec<u8>>, sqlx::Error> {
        sqlx::query_scalar("SELECT data FROM images WHERE id = $1")
            .bind(query.id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_is_sanitized() {
        let record = ImageRecord {
            id: 7,
            device_id: 1,
            device_name: "camera_at_1-s3i:abc".to_string(),
            path: "/home/pi/img.jpg".to_string(),
            content_type: "image/jpeg; encoding=base64url".to_string(),
            taken_at: time::OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
            received_at: time::OffsetDateTime::from_unix_timestamp(1_700_000_005).unwrap(),
            size: 3,
        };
        assert_eq!(record.file_name(), "camera_at_1-s3i_abc_1700000000_7.jpg");
    }
}
