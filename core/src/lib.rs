// storefront_core/src/lib.rs

//! Storefront: the domain core of a small e-commerce backend.
//!
//! The crate owns everything that does not depend on a transport:
//!  - Product catalog queries, filtering and pagination.
//!  - Orders with derived line-item prices and recomputed totals.
//!  - Bulk order creation with a constant number of storage round trips.
//!  - Read-through caching of popular products and per-user order lists.
//!  - Thumbnail derivation for product images.
//!  - Background jobs (order notifications, orders report).
//!
//! Persistence, cache and job brokers sit behind the [`Storage`], [`Cache`]
//! and [`JobQueue`] traits. In-memory implementations are shipped here; the
//! server crate adds the Postgres one.

pub mod cache;
pub mod error;
pub mod jobs;
pub mod media;
pub mod models;
pub mod pricing;
pub mod query;
pub mod services;
pub mod storage;

// --- Re-exports for the Public API ---

pub use crate::cache::{Cache, MemoryCache};
pub use crate::error::{CoreError, CoreResult};
pub use crate::jobs::{Job, JobQueue, JobReceiver, JobWorker, LogNotifier, Notification, Notifier, TaskQueue};
pub use crate::media::MediaRoot;
pub use crate::query::{Page, PageRequest, ProductOrdering, ProductQuery};
pub use crate::services::{CatalogService, OrderService, ServiceSettings};
pub use crate::storage::{MemoryStorage, Storage};
