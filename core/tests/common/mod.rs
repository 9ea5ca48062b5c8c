// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use storefront_core::jobs::{Job, JobQueue, Notification, Notifier};
use storefront_core::models::{NewUser, Product, ProductInput, ProductWrite, User, Viewer};
use storefront_core::{
  Cache, CatalogService, CoreError, CoreResult, MediaRoot, MemoryCache, MemoryStorage, OrderService, ServiceSettings,
  Storage, TaskQueue,
};
use tracing::Level;

// --- Fixture wiring ---
pub struct Harness {
  pub storage: Arc<MemoryStorage>,
  pub cache: Arc<MemoryCache>,
  pub catalog: CatalogService,
  pub orders: OrderService,
  pub jobs: storefront_core::JobReceiver,
}

pub fn harness() -> Harness {
  harness_with_media(MediaRoot::new(std::env::temp_dir().join("storefront-tests-unused")))
}

pub fn harness_with_media(media: MediaRoot) -> Harness {
  setup_tracing();
  let storage = Arc::new(MemoryStorage::new());
  let cache = Arc::new(MemoryCache::new());
  let (queue, jobs) = TaskQueue::channel();
  let settings = ServiceSettings::default();
  let catalog = CatalogService::new(storage.clone(), cache.clone(), media, settings);
  let orders = OrderService::new(storage.clone(), cache.clone(), Arc::new(queue), settings);
  Harness { storage, cache, catalog, orders, jobs }
}

pub fn dec(raw: &str) -> Decimal {
  raw.parse().unwrap()
}

pub fn product_input(name: &str, price: &str) -> ProductInput {
  ProductInput {
    name: name.to_string(),
    price: dec(price),
    description: None,
    is_18_plus: false,
    category_id: None,
    tag_ids: Vec::new(),
    image: None,
    manual: None,
  }
}

/// Inserts straight into storage, bypassing validation and cache effects.
pub async fn seed_product(storage: &MemoryStorage, name: &str, price: &str) -> Product {
  storage
    .insert_product(ProductWrite::from_input(product_input(name, price), None))
    .await
    .unwrap()
}

pub async fn seed_user(storage: &MemoryStorage, username: &str, is_superuser: bool) -> (User, Viewer) {
  let user = storage
    .insert_user(NewUser {
      username: username.to_string(),
      email: format!("{}@example.com", username),
      password_hash: "not-a-real-hash".to_string(),
      is_superuser,
    })
    .await
    .unwrap();
  let viewer = Viewer::from(&user);
  (user, viewer)
}

// --- Failing collaborators ---
/// A cache whose backend is always down.
pub struct FailingCache;

#[async_trait]
impl Cache for FailingCache {
  async fn get(&self, _key: &str) -> CoreResult<Option<String>> {
    Err(CoreError::Cache("connection refused".to_string()))
  }
  async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> CoreResult<()> {
    Err(CoreError::Cache("connection refused".to_string()))
  }
  async fn delete(&self, _key: &str) -> CoreResult<()> {
    Err(CoreError::Cache("connection refused".to_string()))
  }
  async fn delete_prefix(&self, _prefix: &str) -> CoreResult<u64> {
    Err(CoreError::Cache("connection refused".to_string()))
  }
}

/// A broker that rejects every job.
pub struct FailingQueue;

#[async_trait]
impl JobQueue for FailingQueue {
  async fn enqueue(&self, _job: Job) -> CoreResult<()> {
    Err(CoreError::Queue("broker unavailable".to_string()))
  }
}

/// Fails the first `failures` sends, then records deliveries.
#[derive(Default)]
pub struct FlakyNotifier {
  pub failures: usize,
  pub attempts: AtomicUsize,
  pub delivered: Mutex<Vec<Notification>>,
}

impl FlakyNotifier {
  pub fn failing(failures: usize) -> Self {
    Self { failures, ..Self::default() }
  }

  pub fn attempts(&self) -> usize {
    self.attempts.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Notifier for FlakyNotifier {
  async fn send(&self, notification: &Notification) -> CoreResult<String> {
    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
    if attempt < self.failures {
      return Err(CoreError::Internal(format!("smtp timeout on attempt {}", attempt + 1)));
    }
    self.delivered.lock().push(notification.clone());
    Ok(format!("test_message_{}", attempt))
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
