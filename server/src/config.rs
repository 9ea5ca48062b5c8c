// storefront_server/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use storefront_core::ServiceSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
  Postgres,
  Memory,
}

impl FromStr for StorageBackend {
  type Err = AppError;

  fn from_str(raw: &str) -> Result<Self> {
    match raw.trim().to_ascii_lowercase().as_str() {
      "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
      "memory" => Ok(StorageBackend::Memory),
      other => Err(AppError::Config(format!(
        "Invalid STORAGE_BACKEND '{}'. Expected 'postgres' or 'memory'.",
        other
      ))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub storage_backend: StorageBackend,
  /// Required for the Postgres backend only.
  pub database_url: Option<String>,
  pub database_max_connections: u32,
  pub media_root: PathBuf,
  pub page_size: u32,
  pub cache_ttl: Duration,
  pub session_ttl: Duration,
  pub job_max_attempts: u32,
  pub notification_sender: String,
  pub log_format: LogFormat,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 8080,
      storage_backend: StorageBackend::Memory,
      database_url: None,
      database_max_connections: 10,
      media_root: PathBuf::from("./media"),
      page_size: 10,
      cache_ttl: Duration::from_secs(60 * 60),
      session_ttl: Duration::from_secs(14 * 24 * 60 * 60),
      job_max_attempts: 3,
      notification_sender: "noreply@example.com".to_string(),
      log_format: LogFormat::Pretty,
    }
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the configuration from an arbitrary variable source.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let defaults = Self::default();

    let server_host = lookup("SERVER_HOST").unwrap_or(defaults.server_host);
    let server_port = parse_or("SERVER_PORT", &lookup, defaults.server_port)?;
    let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

    // Postgres is the default whenever a database is configured.
    let storage_backend = match lookup("STORAGE_BACKEND") {
      Some(raw) => raw.parse()?,
      None if database_url.is_some() => StorageBackend::Postgres,
      None => StorageBackend::Memory,
    };
    if storage_backend == StorageBackend::Postgres && database_url.is_none() {
      return Err(AppError::Config(
        "Missing environment variable 'DATABASE_URL' (required by the postgres storage backend).".to_string(),
      ));
    }

    let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", &lookup, defaults.database_max_connections)?;
    let media_root = lookup("MEDIA_ROOT").map(PathBuf::from).unwrap_or(defaults.media_root);

    let page_size = parse_or("PAGE_SIZE", &lookup, defaults.page_size)?;
    if page_size == 0 {
      return Err(AppError::Config("PAGE_SIZE must be at least 1.".to_string()));
    }
    let cache_ttl = Duration::from_secs(parse_or("CACHE_TTL_SECONDS", &lookup, defaults.cache_ttl.as_secs())?);
    let session_ttl = Duration::from_secs(parse_or("SESSION_TTL_SECONDS", &lookup, defaults.session_ttl.as_secs())?);
    let job_max_attempts = parse_or("JOB_MAX_ATTEMPTS", &lookup, defaults.job_max_attempts)?;
    let notification_sender = lookup("NOTIFICATION_SENDER").unwrap_or(defaults.notification_sender);

    let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
      None | Some("") | Some("pretty") => LogFormat::Pretty,
      Some("json") => LogFormat::Json,
      Some(other) => {
        return Err(AppError::Config(format!(
          "Invalid LOG_FORMAT '{}'. Expected 'pretty' or 'json'.",
          other
        )))
      }
    };

    Ok(Self {
      server_host,
      server_port,
      storage_backend,
      database_url,
      database_max_connections,
      media_root,
      page_size,
      cache_ttl,
      session_ttl,
      job_max_attempts,
      notification_sender,
      log_format,
    })
  }

  pub fn bind_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }

  pub fn service_settings(&self) -> ServiceSettings {
    ServiceSettings { page_size: self.page_size, cache_ttl: self.cache_ttl }
  }
}

fn parse_or<T>(name: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match lookup(name) {
    Some(raw) => raw
      .trim()
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e))),
    None => Ok(default),
  }
}
