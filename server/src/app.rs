// storefront_server/src/app.rs

//! Process wiring shared by the CLI commands: storage backend selection, the
//! job worker and the HTTP server itself.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::NormalizePath, middleware::TrailingSlash, web, App, HttpServer};
use storefront_core::{
  Cache, CatalogService, JobWorker, LogNotifier, MemoryCache, MemoryStorage, Storage, TaskQueue,
};
use tracing::{info, instrument, warn};

use crate::config::{AppConfig, StorageBackend};
use crate::db::{self, PgStorage};
use crate::errors::{AppError, Result};
use crate::state::AppState;
use crate::web::configure_app_routes;

const JOB_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Opens the configured backend. Postgres schemas are migrated on open.
pub async fn open_storage(config: &AppConfig) -> Result<Arc<dyn Storage>> {
  match config.storage_backend {
    StorageBackend::Memory => {
      warn!("Using the in-memory storage backend; data is lost on shutdown.");
      Ok(Arc::new(MemoryStorage::new()))
    }
    StorageBackend::Postgres => {
      let pool = db::connect(config).await?;
      db::migrate(&pool).await?;
      Ok(Arc::new(PgStorage::new(pool)))
    }
  }
}

pub async fn serve(config: AppConfig) -> Result<()> {
  let storage = open_storage(&config).await?;
  let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
  let (queue, receiver) = TaskQueue::channel();

  let worker = JobWorker::new(
    storage.clone(),
    cache.clone(),
    Arc::new(LogNotifier::new(config.notification_sender.clone())),
  )
  .with_retry(config.job_max_attempts, JOB_RETRY_BACKOFF);
  actix_rt::spawn(Arc::new(worker).run(receiver));

  let server_address = config.bind_address();
  let app_state = AppState::new(config, storage, cache, Arc::new(queue));
  info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(web::Data::new(app_state.clone())) // Share AppState with handlers
      .wrap(NormalizePath::new(TrailingSlash::Trim))
      .wrap(tracing_actix_web::TracingLogger::default()) // Actix middleware for tracing requests
      .configure(configure_app_routes)
  })
  .bind(&server_address)
  .map_err(|e| AppError::Config(format!("Cannot bind {}: {}", server_address, e)))?
  .run()
  .await
  .map_err(|e| AppError::Internal(format!("HTTP server failed: {}", e)))
}

/// Product ids from the first column of a CSV export. Blank lines are
/// skipped; anything else that is not an integer id is an error.
pub fn read_id_column(content: &str) -> Result<Vec<i64>> {
  first_fields(content)
    .into_iter()
    .filter(|record| !record.blank)
    .map(|record| {
      let first = record.first.trim();
      first
        .parse::<i64>()
        .map_err(|_| AppError::Internal(format!("Line {}: '{}' is not a product id.", record.line, first)))
    })
    .collect()
}

struct CsvRecord {
  /// Line the record starts on, 1-based.
  line: usize,
  first: String,
  blank: bool,
}

/// Splits CSV records and keeps their first field. Quoted fields may hold
/// commas, line breaks and doubled quotes.
fn first_fields(content: &str) -> Vec<CsvRecord> {
  let mut records = Vec::new();
  let mut record = CsvRecord { line: 1, first: String::new(), blank: true };
  let mut line = 1;
  let mut in_quotes = false;
  let mut in_first = true;
  let mut chars = content.chars().peekable();

  while let Some(ch) = chars.next() {
    if ch == '\n' && !in_quotes {
      line += 1;
      let next = CsvRecord { line, first: String::new(), blank: true };
      records.push(std::mem::replace(&mut record, next));
      in_first = true;
      continue;
    }
    if !ch.is_whitespace() {
      record.blank = false;
    }
    match ch {
      '"' if in_quotes && chars.peek() == Some(&'"') => {
        chars.next();
        if in_first {
          record.first.push('"');
        }
      }
      '"' => in_quotes = !in_quotes,
      ',' if !in_quotes => in_first = false,
      other => {
        if other == '\n' {
          line += 1;
        }
        if in_first {
          record.first.push(other);
        }
      }
    }
  }
  records.push(record);
  records
}

#[instrument(name = "app::delete_duplicates", skip(catalog))]
pub async fn delete_duplicates(catalog: &CatalogService, csv_path: &Path) -> Result<u64> {
  let content = tokio::fs::read_to_string(csv_path)
    .await
    .map_err(|e| AppError::Internal(format!("Cannot read {}: {}", csv_path.display(), e)))?;
  let ids = read_id_column(&content)?;
  let deleted = catalog.delete_products(&ids).await?;
  info!(listed = ids.len(), deleted, "Duplicate products deleted.");
  Ok(deleted)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_the_first_column() {
    let ids = read_id_column("12,Lamp\n\n\"7\",Chair,3\n40\n").unwrap();
    assert_eq!(ids, vec![12, 7, 40]);
  }

  #[test]
  fn quoted_fields_may_hold_commas_and_line_breaks() {
    let content = "\"12\",\"Lamp, large\"\n7,\"Chair\nwith \"\"arms\"\"\"\n\"40\",x";
    assert_eq!(read_id_column(content).unwrap(), vec![12, 7, 40]);

    let err = read_id_column("1,ok\n\"2,3\",x\n").unwrap_err();
    assert!(err.to_string().contains("'2,3'"));
    let err = read_id_column("1,\"a\nb\"\nname,x\n").unwrap_err();
    assert!(err.to_string().contains("Line 3"));
  }

  #[test]
  fn rejects_non_numeric_ids() {
    let err = read_id_column("1,ok\nid,name\n").unwrap_err();
    assert!(err.to_string().contains("Line 2"));
  }
}
