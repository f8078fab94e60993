use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use sqlx::types::Json;

/// Whether a logged item came from the message or the event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "logged_item_kind")]
pub enum LoggedItemKind {
    Message,
    Event,
}

#[derive(Debug, Clone)]
/// Append a raw message or event to `all_messages_and_events`.
pub struct InsertLoggedItem {
    pub kind: LoggedItemKind,
    pub identifier: String,
    pub sender: String,
    pub data: serde_json::Value,
}

impl Processor<InsertLoggedItem> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertLoggedItem")]
    async fn process(&self, insert: InsertLoggedItem) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO all_messages_and_events (kind, identifier, sender, data)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(insert.kind)
        .bind(insert.identifier)
        .bind(insert.sender)
        .bind(Json(insert.data))
        .fetch_one(&self.pool)
        .await
    }
}
