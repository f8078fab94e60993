//! TOML file configuration structures.
//!
//! These structs directly map to the `expco.toml` file format. Identifiers
//! and URLs stay plain strings here and are validated by the loader.

use expco_sdk::config::EventTopics;
use serde::{Deserialize, Serialize};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub s3i: S3iConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

/// S3I connection section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3iConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Log in as a person instead of as the client itself.
    pub username: Option<String>,
    pub password: Option<String>,
    pub message_queue: String,
    pub event_queue: String,
    pub auth_url: String,
    pub auth_realm: String,
    pub broker_url: String,
    #[serde(default = "default_token_refresh_margin_secs")]
    pub token_refresh_margin_secs: u64,
    #[serde(default)]
    pub topics: EventTopics,
}

fn default_token_refresh_margin_secs() -> u64 {
    60
}

/// Database section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Falls back to the `DATABASE_URL` environment variable.
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

/// Processing section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Upper bound on items processed at once per batch. Unbounded if unset.
    pub max_concurrency: Option<usize>,
    /// Abandon a `run forever` cycle after this many seconds.
    pub cycle_timeout_secs: Option<u64>,
}
