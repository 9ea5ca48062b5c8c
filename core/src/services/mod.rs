// storefront_core/src/services/mod.rs

//! Service layer. Each write performs its side effects (price derivation,
//! cache invalidation, job enqueueing) explicitly, right where it happens.

use std::time::Duration;

pub mod catalog;
pub mod orders;

pub use catalog::CatalogService;
pub use orders::OrderService;

/// Products returned by the popular-products ranking.
pub const POPULAR_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
  pub page_size: u32,
  pub cache_ttl: Duration,
}

impl Default for ServiceSettings {
  fn default() -> Self {
    Self {
      page_size: 10,
      cache_ttl: Duration::from_secs(60 * 60),
    }
  }
}
