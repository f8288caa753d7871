use std::{str::FromStr, time::Duration};

use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use tracing::info;

use crate::{
    config::ForumConfig,
    error::{Result, StorageContext},
};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Opens the connection pool and brings the schema up to date.
pub async fn connect(config: &ForumConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)
        .context("parse database url")?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .connect_with(options)
        .await
        .context("connect to database")?;

    info!(max_connections = config.max_connections, "Database connection pool established");

    MIGRATOR.run(&pool).await?;
    info!("Database migrations completed");

    Ok(pool)
}
