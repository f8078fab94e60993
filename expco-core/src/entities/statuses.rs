use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

/// A status reported by a device at a certain time.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Status {
    pub id: i64,
    pub device_id: i64,
    pub status_name: String,
    pub status_error_detail: String,
    pub status_error_source: String,
    pub status_error_text: String,
    pub sent_at: time::OffsetDateTime,
    pub received_at: time::OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct InsertStatus {
    pub device_id: i64,
    pub status_name: String,
    pub status_error_detail: String,
    pub status_error_source: String,
    pub status_error_text: String,
    pub sent_at: time::OffsetDateTime,
}

impl Processor<InsertStatus> for DatabaseProcessor {
    type Output = Status;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertStatus")]
    async fn process(&self, insert: InsertStatus) -> Result<Status, sqlx::Error> {
        sqlx::query_as::<_, Status>(
            r#"
            INSERT INTO statuses (
                device_id, status_name, status_error_detail,
                status_error_source, status_error_text, sent_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, device_id, status_name, status_error_detail,
                      status_error_source, status_error_text, sent_at, received_at
            "#,
        )
        .bind(insert.device_id)
        .bind(insert.status_name)
        .bind(insert.status_error_detail)
        .bind(insert.status_error_source)
        .bind(insert.status_error_text)
        .bind(insert.sent_at)
        .fetch_one(&self.pool)
        .await
    }
}
