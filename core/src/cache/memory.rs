// storefront_core/src/cache/memory.rs

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::Cache;
use crate::error::CoreResult;

struct Entry {
  value: String,
  expires_at: Option<Instant>,
}

impl Entry {
  fn is_live(&self, now: Instant) -> bool {
    self.expires_at.map_or(true, |deadline| deadline > now)
  }
}

/// Process-local cache. Expired entries are dropped lazily on access.
#[derive(Default)]
pub struct MemoryCache {
  entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Whether a live entry exists for `key`.
  pub fn contains(&self, key: &str) -> bool {
    let now = Instant::now();
    self.entries.lock().get(key).is_some_and(|entry| entry.is_live(now))
  }
}

#[async_trait]
impl Cache for MemoryCache {
  async fn get(&self, key: &str) -> CoreResult<Option<String>> {
    let now = Instant::now();
    let mut entries = self.entries.lock();
    match entries.get(key) {
      Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
      Some(_) => {
        entries.remove(key);
        Ok(None)
      }
      None => Ok(None),
    }
  }

  async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CoreResult<()> {
    let expires_at = ttl.map(|ttl| Instant::now() + ttl);
    self.entries.lock().insert(key.to_string(), Entry { value, expires_at });
    Ok(())
  }

  async fn delete(&self, key: &str) -> CoreResult<()> {
    self.entries.lock().remove(key);
    Ok(())
  }

  async fn delete_prefix(&self, prefix: &str) -> CoreResult<u64> {
    let mut entries = self.entries.lock();
    let before = entries.len();
    entries.retain(|key, _| !key.starts_with(prefix));
    Ok((before - entries.len()) as u64)
  }
}
