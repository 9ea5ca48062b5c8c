// storefront_core/src/cache/mod.rs

//! Key-value cache seam with time-based expiry.
//!
//! Callers go through the best-effort helpers below: a cache failure is
//! logged and treated as a miss, so the data layer stays the source of truth.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::error::CoreResult;

pub mod memory;

pub use memory::MemoryCache;

/// Cache key layout.
pub mod keys {
  use uuid::Uuid;

  pub const POPULAR_PRODUCTS: &str = "popular_products";
  pub const ORDERS_PREFIX: &str = "orders:";
  pub const ORDERS_REPORT: &str = "orders_report";

  pub fn orders(user_id: i64) -> String {
    format!("{}{}", ORDERS_PREFIX, user_id)
  }

  pub fn order_notified(order_id: Uuid) -> String {
    format!("order_notified:{}", order_id)
  }
}

#[async_trait]
pub trait Cache: Send + Sync {
  async fn get(&self, key: &str) -> CoreResult<Option<String>>;
  /// `ttl = None` keeps the entry until it is deleted.
  async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CoreResult<()>;
  async fn delete(&self, key: &str) -> CoreResult<()>;
  /// Deletes every key starting with `prefix`, returning how many were removed.
  async fn delete_prefix(&self, prefix: &str) -> CoreResult<u64>;
}

/// Reads and decodes a JSON entry. Backend errors and undecodable entries are misses.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
  match cache.get(key).await {
    Ok(Some(raw)) => match serde_json::from_str(&raw) {
      Ok(value) => {
        debug!(cache_key = key, "Cache hit.");
        Some(value)
      }
      Err(e) => {
        warn!(cache_key = key, error = %e, "Discarding undecodable cache entry.");
        None
      }
    },
    Ok(None) => {
      debug!(cache_key = key, "Cache miss.");
      None
    }
    Err(e) => {
      warn!(cache_key = key, error = %e, "Cache read failed; falling back to storage.");
      None
    }
  }
}

pub async fn set_json<T: Serialize + ?Sized>(cache: &dyn Cache, key: &str, value: &T, ttl: Option<Duration>) {
  let raw = match serde_json::to_string(value) {
    Ok(raw) => raw,
    Err(e) => {
      warn!(cache_key = key, error = %e, "Could not encode value for cache.");
      return;
    }
  };
  if let Err(e) = cache.set(key, raw, ttl).await {
    warn!(cache_key = key, error = %e, "Cache write failed.");
  }
}

pub async fn invalidate(cache: &dyn Cache, key: &str) {
  match cache.delete(key).await {
    Ok(()) => debug!(cache_key = key, "Invalidated cache entry."),
    Err(e) => warn!(cache_key = key, error = %e, "Cache invalidation failed."),
  }
}

pub async fn invalidate_prefix(cache: &dyn Cache, prefix: &str) {
  match cache.delete_prefix(prefix).await {
    Ok(removed) => debug!(cache_prefix = prefix, removed, "Invalidated cache entries."),
    Err(e) => warn!(cache_prefix = prefix, error = %e, "Cache invalidation failed."),
  }
}
