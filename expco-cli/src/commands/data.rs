use crate::state::AppState;
use anyhow::Context;
use clap::Subcommand;
use expco_core::entities::devices::{DeviceKind, InsertDevice, ListDevices};
use expco_core::entities::images::{GetImageData, ImageRecord, ListImages};
use expco_core::framework::DatabaseProcessor;
use expco_sdk::objects::{EventQueue, MessageQueue, S3iId};
use kanau::processor::Processor;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum DataCommand {
    /// Registered devices
    #[command(subcommand)]
    Devices(DevicesCommand),

    /// Stored images
    #[command(subcommand)]
    Images(ImagesCommand),
}

#[derive(Subcommand, Debug)]
pub enum DevicesCommand {
    /// Register a device
    Add {
        #[arg(long)]
        s3i_id: S3iId,
        #[arg(long)]
        kind: DeviceKind,
        /// Defaults to `{kind}_at_{rhizotron}-{s3i_id}`
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        rhizotron: Option<i32>,
        #[arg(long)]
        message_queue: Option<MessageQueue>,
        #[arg(long)]
        event_queue: Option<EventQueue>,
    },

    /// Print every registered device as JSON
    List,
}

#[derive(Subcommand, Debug)]
pub enum ImagesCommand {
    /// Write every image into DIR, plus a metadata.json describing them
    Export { dir: PathBuf },
}

pub async fn execute(cmd: DataCommand, state: &AppState) -> anyhow::Result<()> {
    let pool = state.connect_db().await?;
    let db = DatabaseProcessor::new(pool.clone());

    let result = match cmd {
        DataCommand::Devices(DevicesCommand::Add {
            s3i_id,
            kind,
            name,
            rhizotron,
            message_queue,
            event_queue,
        }) => {
            let device = db
                .process(InsertDevice {
                    name,
                    s3i_id,
                    kind,
                    rhizotron,
                    message_queue,
                    event_queue,
                })
                .await?;
            tracing::info!(id = device.id, name = %device.name, "Device registered");
            Ok(())
        }
        DataCommand::Devices(DevicesCommand::List) => {
            let devices = db.process(ListDevices).await?;
            println!("{}", serde_json::to_string_pretty(&devices)?);
            Ok(())
        }
        DataCommand::Images(ImagesCommand::Export { dir }) => export_images(&db, dir).await,
    };

    pool.close().await;
    result
}

async fn export_images(db: &DatabaseProcessor, dir: PathBuf) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let dir = tokio::fs::canonicalize(&dir).await?;
    tracing::info!("Using output directory: {}", dir.display());

    let images = db.process(ListImages).await?;
    for image in &images {
        let Some(data) = db.process(GetImageData { id: image.id }).await? else {
            tracing::warn!(id = image.id, "Image vanished while exporting, skipping");
            continue;
        };
        let path = dir.join(image.file_name());
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let metadata = serde_json::to_vec_pretty(&metadata_by_file(&images))?;
    tokio::fs::write(dir.join("metadata.json"), metadata).await?;
    tracing::info!(count = images.len(), "Images exported");
    Ok(())
}

/// Metadata keyed by the exported file name.
fn metadata_by_file(images: &[ImageRecord]) -> BTreeMap<String, &ImageRecord> {
    images
        .iter()
        .map(|image| (image.file_name(), image))
        .collect()
}
