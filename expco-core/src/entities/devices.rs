use crate::entities::EntityError;
use crate::framework::DatabaseProcessor;
use expco_sdk::objects::{EventQueue, MessageQueue, S3iId};
use kanau::processor::Processor;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// What a device does in the experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize)]
#[sqlx(rename_all = "snake_case", type_name = "device_kind")]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Camera,
    WaterSupply,
    Coordinator,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Camera => "camera",
            DeviceKind::WaterSupply => "water_supply",
            DeviceKind::Coordinator => "coordinator",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "camera" => Ok(DeviceKind::Camera),
            "water_supply" => Ok(DeviceKind::WaterSupply),
            "coordinator" => Ok(DeviceKind::Coordinator),
            other => Err(EntityError::UnknownDeviceKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub s3i_id: String,
    pub kind: DeviceKind,
    pub rhizotron: Option<i32>,
    pub message_queue: Option<String>,
    pub event_queue: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
}

const DEVICE_COLUMNS: &str =
    "id, name, s3i_id, kind, rhizotron, message_queue, event_queue, created_at";

#[derive(Debug, Clone)]
/// Register a new device. The S3I id must not be registered yet.
pub struct InsertDevice {
    pub name: Option<String>,
    pub s3i_id: S3iId,
    pub kind: DeviceKind,
    pub rhizotron: Option<i32>,
    pub message_queue: Option<MessageQueue>,
    pub event_queue: Option<EventQueue>,
}

impl InsertDevice {
    /// `{kind}_at_{rhizotron}-{s3i_id}`, used when no name is given.
    pub fn default_name(&self) -> String {
        let rhizotron = self
            .rhizotron
            .map_or_else(|| "none".to_string(), |n| n.to_string());
        format!("{}_at_{}-{}", self.kind, rhizotron, self.s3i_id)
    }
}

impl Processor<InsertDevice> for DatabaseProcessor {
    type Output = Device;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertDevice")]
    async fn process(&self, insert: InsertDevice) -> Result<Device, sqlx::Error> {
        let name = insert.name.clone().unwrap_or_else(|| insert.default_name());
        let device = sqlx::query_as::<_, Device>(&format!(
            r#"
            INSERT INTO devices (name, s3i_id, kind, rhizotron, message_queue, event_queue)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {DEVICE_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(insert.s3i_id.as_str())
        .bind(insert.kind)
        .bind(insert.rhizotron)
        .bind(insert.message_queue.as_ref().map(MessageQueue::as_str))
        .bind(insert.event_queue.as_ref().map(EventQueue::as_str))
        .fetch_one(&self.pool)
        .await?;
        Ok(device)
    }
}

#[derive(Debug, Clone)]
/// Look up the device registered under an S3I id.
pub struct GetDeviceByS3iId {
    pub s3i_id: String,
}

impl Processor<GetDeviceByS3iId> for DatabaseProcessor {
    type Output = Option<Device>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetDeviceByS3iId")]
    async fn process(&self, query: GetDeviceByS3iId) -> Result<Option<Device>, sqlx::Error> {
        sqlx::query_as::<_, Device>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE s3i_id = $1"
        ))
        .bind(query.s3i_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListDevices;

impl Processor<ListDevices> for DatabaseProcessor {
    type Output = Vec<Device>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListDevices")]
    async fn process(&self, _query: ListDevices) -> Result<Vec<Device>, sqlx::Error> {
        sqlx::query_as::<_, Device>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
    }
}

impl DatabaseProcessor {
    /// The device that sent an item, or [`EntityError::DeviceNotFound`].
    pub async fn resolve_device(&self, s3i_id: &str) -> Result<Device, EntityError> {
        self.process(GetDeviceByS3iId {
            s3i_id: s3i_id.to_string(),
        })
        .await?
        .ok_or_else(|| EntityError::DeviceNotFound(s3i_id.to_string()))
    }
}
