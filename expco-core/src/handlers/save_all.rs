//! Keep a raw copy of every message and event.

use anyhow::Context;
use async_trait::async_trait;
use expco_sdk::objects::{S3iEvent, S3iMessage};
use kanau::processor::Processor;

use crate::entities::message_log::{InsertLoggedItem, LoggedItemKind};
use crate::framework::DatabaseProcessor;
use crate::processors::Handler;

pub struct SaveAll {
    db: DatabaseProcessor,
}

impl SaveAll {
    pub const NAME: &'static str = "save_all";

    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }

    async fn save(
        &self,
        kind: LoggedItemKind,
        identifier: &str,
        sender: &str,
        data: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.db
            .process(InsertLoggedItem {
                kind,
                identifier: identifier.to_string(),
                sender: sender.to_string(),
                data,
            })
            .await
            .context("failed to store raw item")?;
        Ok(())
    }
}

#[async_trait]
impl Handler<S3iMessage> for SaveAll {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn matches(&self, _message: &S3iMessage) -> bool {
        true
    }

    async fn run(&self, message: &S3iMessage) -> anyhow::Result<()> {
        let envelope = message.envelope();
        let data = serde_json::to_value(message)?;
        self.save(
            LoggedItemKind::Message,
            &envelope.identifier,
            &envelope.sender,
            data,
        )
        .await
    }
}

#[async_trait]
impl Handler<S3iEvent> for SaveAll {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn matches(&self, _event: &S3iEvent) -> bool {
        true
    }

    async fn run(&self, event: &S3iEvent) -> anyhow::Result<()> {
        let data = serde_json::to_value(event)?;
        self.save(LoggedItemKind::Event, &event.identifier, &event.sender, data)
            .await
    }
}
