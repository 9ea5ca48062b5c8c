// storefront_server/src/db/mod.rs

pub mod postgres;
pub mod rows;

pub use postgres::PgStorage;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};

pub async fn connect(config: &AppConfig) -> Result<PgPool> {
  let url = config
    .database_url
    .as_deref()
    .ok_or_else(|| AppError::Config("DATABASE_URL is not set.".to_string()))?;
  let pool = PgPoolOptions::new()
    .max_connections(config.database_max_connections)
    .connect(url)
    .await?;
  info!(max_connections = config.database_max_connections, "Successfully connected to the database.");
  Ok(pool)
}

/// Applies the embedded schema migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
  sqlx::migrate!("./migrations").run(pool).await?;
  info!("Database migrations applied.");
  Ok(())
}
