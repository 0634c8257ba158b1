use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;

use crate::config::Config;
use crate::store::{InMemoryStore, MySqlStore, Store};

pub async fn init_db(database_url: &str, acquire_timeout: Duration) -> Result<MySqlPool> {
    MySqlPoolOptions::new()
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
        .context("Failed to connect to database")
}

/// Builds the store the engine will own for the life of the process.
pub async fn init_store(config: &Config) -> Result<Arc<dyn Store>> {
    match &config.database_url {
        Some(url) => {
            let pool = init_db(url, Duration::from_secs(config.store_timeout_secs)).await?;
            tracing::info!("Connected to MySQL");
            Ok(Arc::new(MySqlStore::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data will not survive restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}
