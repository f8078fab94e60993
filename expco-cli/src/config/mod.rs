//! Configuration module for the expco binary.
//!
//! Reads the TOML file, validates identifiers and URLs, and builds the
//! runtime configuration passed to every command.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{AppConfig, DatabaseConfig, ProcessingConfig};
use expco_sdk::config::{Credentials, S3iConfig};
use expco_sdk::objects::{EventQueue, MessageQueue, S3iId};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid {field}: {message}")]
    ValidationError {
        field: &'static str,
        message: String,
    },

    #[error("no database url: set [database].url or the DATABASE_URL environment variable")]
    MissingDatabaseUrl,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Read, validate and convert the configuration file.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let content =
            std::fs::read_to_string(&self.config_path).map_err(|source| ConfigError::IoError {
                path: self.config_path.clone(),
                source,
            })?;
        Self::from_toml(&content, std::env::var("DATABASE_URL").ok())
    }

    /// Build the configuration from TOML text. `env_database_url` is used when
    /// the file does not name a database.
    pub fn from_toml(
        content: &str,
        env_database_url: Option<String>,
    ) -> Result<AppConfig, ConfigError> {
        let file_config: FileConfig = toml::from_str(content)?;
        build_app_config(file_config, env_database_url)
    }
}

fn build_app_config(
    file: FileConfig,
    env_database_url: Option<String>,
) -> Result<AppConfig, ConfigError> {
    let s3i = file.s3i;

    let client_id: S3iId = parse_field("s3i.client_id", &s3i.client_id)?;
    let message_queue: MessageQueue = parse_field("s3i.message_queue", &s3i.message_queue)?;
    let event_queue: EventQueue = parse_field("s3i.event_queue", &s3i.event_queue)?;
    let auth_url: Url = parse_field("s3i.auth_url", &s3i.auth_url)?;
    let broker_url: Url = parse_field("s3i.broker_url", &s3i.broker_url)?;

    if s3i.client_secret.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "s3i.client_secret",
            message: "must not be empty".to_string(),
        });
    }
    if s3i.username.is_some() != s3i.password.is_some() {
        return Err(ConfigError::ValidationError {
            field: "s3i.username",
            message: "username and password must be given together".to_string(),
        });
    }
    if message_queue.owner().ok().as_ref() != Some(&client_id) {
        tracing::warn!(
            client_id = %client_id,
            message_queue = %message_queue,
            "Message queue does not belong to the configured client"
        );
    }

    let mut credentials = Credentials::new(client_id, s3i.client_secret);
    if let (Some(username), Some(password)) = (s3i.username, s3i.password) {
        credentials = credentials.with_person(username, password);
    }

    let database_url = file.database.url.or(env_database_url);

    Ok(AppConfig {
        s3i: S3iConfig {
            credentials,
            message_queue,
            event_queue,
            auth_url,
            auth_realm: s3i.auth_realm,
            broker_url,
            topics: s3i.topics,
            token_refresh_margin: Duration::from_secs(s3i.token_refresh_margin_secs),
        },
        database: DatabaseConfig {
            url: database_url,
            max_connections: file.database.max_connections,
        },
        processing: ProcessingConfig {
            max_concurrency: file.processing.max_concurrency,
            cycle_timeout: file.processing.cycle_timeout_secs.map(Duration::from_secs),
        },
    })
}

fn parse_field<T>(field: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| ConfigError::ValidationError {
            field,
            message: format!("'{value}': {e}"),
        })
}

impl DatabaseConfig {
    pub fn require_url(&self) -> Result<&str, ConfigError> {
        self.url.as_deref().ok_or(ConfigError::MissingDatabaseUrl)
    }
}
