//! Everything a command needs, built once from the configuration.

use crate::config::runtime::AppConfig;
use expco_core::framework::DatabaseProcessor;
use expco_core::handlers;
use expco_core::processors::Coordinator;
use expco_sdk::client::BrokerClient;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

pub struct AppState {
    pub config: AppConfig,
    /// Broker client sharing one token cache across all commands.
    pub broker: Arc<BrokerClient>,
    migrate: bool,
}

impl AppState {
    pub fn new(config: AppConfig, migrate: bool) -> anyhow::Result<Self> {
        let broker = Arc::new(BrokerClient::from_config(&config.s3i)?);
        Ok(Self {
            config,
            broker,
            migrate,
        })
    }

    /// Connect to the database, running migrations first if requested.
    pub async fn connect_db(&self) -> anyhow::Result<PgPool> {
        let url = self.config.database.require_url()?;

        tracing::info!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(self.config.database.max_connections)
            .connect(url)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to database: {}", e);
                e
            })?;
        tracing::info!("Database connection established");

        if self.migrate {
            tracing::info!("Running database migrations...");
            sqlx::migrate!("../migrations")
                .run(&pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to run migrations: {}", e);
                    e
                })?;
            tracing::info!("Migrations completed successfully");
        }

        Ok(pool)
    }

    /// A coordinator with every domain handler registered.
    pub fn coordinator(&self, pool: PgPool) -> Coordinator<Arc<BrokerClient>> {
        let db = DatabaseProcessor::new(pool);
        let processing = &self.config.processing;
        let (messages, events) =
            handlers::dispatchers(&db, &self.config.s3i.topics, processing.max_concurrency);
        Coordinator::new(self.broker.clone(), messages, events)
            .with_cycle_timeout(processing.cycle_timeout)
    }
}
