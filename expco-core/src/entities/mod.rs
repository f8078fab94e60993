pub mod devices;
pub mod images;
pub mod message_log;
pub mod statuses;

use thiserror::Error;

/// Errors from entity lookups that go beyond a failed query.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unknown device kind '{0}', expected camera, water_supply or coordinator")]
    UnknownDeviceKind(String),

    #[error("no device registered for {0}")]
    DeviceNotFound(String),
}
