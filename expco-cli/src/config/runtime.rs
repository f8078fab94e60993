//! Validated runtime configuration.
//!
//! The S3I part is the shared `expco_sdk::config::S3iConfig`; the rest only
//! matters to the binary.

use std::time::Duration;

pub use expco_sdk::config::S3iConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub s3i: S3iConfig,
    pub database: DatabaseConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// From the config file or `DATABASE_URL`. Only required by commands
    /// that touch the database.
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessingConfig {
    pub max_concurrency: Option<usize>,
    pub cycle_timeout: Option<Duration>,
}
