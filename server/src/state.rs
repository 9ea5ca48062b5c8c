// storefront_server/src/state.rs

use std::sync::Arc;

use storefront_core::{Cache, CatalogService, JobQueue, MediaRoot, OrderService, Storage};

use crate::config::AppConfig;
use crate::graphql::{create_schema, StorefrontSchema};

#[derive(Clone)]
pub struct AppState {
  pub storage: Arc<dyn Storage>,
  pub catalog: CatalogService,
  pub orders: OrderService,
  pub schema: StorefrontSchema,
  pub config: Arc<AppConfig>, // Share loaded config
}

impl AppState {
  /// Wires the services over the given backends. Both API surfaces share the
  /// same service instances.
  pub fn new(
    config: AppConfig,
    storage: Arc<dyn Storage>,
    cache: Arc<dyn Cache>,
    jobs: Arc<dyn JobQueue>,
  ) -> Self {
    let settings = config.service_settings();
    let media = MediaRoot::new(config.media_root.clone());
    let catalog = CatalogService::new(storage.clone(), cache.clone(), media, settings);
    let orders = OrderService::new(storage.clone(), cache, jobs, settings);
    let schema = create_schema(catalog.clone(), orders.clone());
    Self {
      storage,
      catalog,
      orders,
      schema,
      config: Arc::new(config),
    }
  }
}
