use crate::state::AppState;
use anyhow::Context;
use clap::Subcommand;
use expco_sdk::objects::{MessageQueue, S3iEvent, S3iMessage};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum S3iCommand {
    /// Print the oldest message of the message queue
    GetMessage,

    /// Print the oldest event of the event queue
    GetEvent,

    /// Send the message in a JSON file to one or more queues
    SendMessage {
        /// Receiving queue, e.g. `s3ibs://s3i:<uuid>`
        #[arg(long = "to", required = true)]
        to: Vec<MessageQueue>,
        file: PathBuf,
    },

    /// Publish the event in a JSON file on its topic
    SendEvent { file: PathBuf },
}

pub async fn execute(cmd: S3iCommand, state: &AppState) -> anyhow::Result<()> {
    let broker = &state.broker;
    match cmd {
        S3iCommand::GetMessage => match broker.receive_message().await? {
            Some(message) => println!("{}", serde_json::to_string_pretty(&message)?),
            None => tracing::info!(queue = %broker.message_queue(), "Message queue is empty"),
        },
        S3iCommand::GetEvent => match broker.receive_event().await? {
            Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
            None => tracing::info!(queue = %broker.event_queue(), "Event queue is empty"),
        },
        S3iCommand::SendMessage { to, file } => {
            let message: S3iMessage = read_json(&file).await?;
            broker.send_message(&to, &message).await?;
            tracing::info!(%message, receivers = to.len(), "Message sent");
        }
        S3iCommand::SendEvent { file } => {
            let event: S3iEvent = read_json(&file).await?;
            broker.send_event(&event).await?;
            tracing::info!(%event, "Event sent");
        }
    }
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}
