// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use std::sync::Arc;

use rust_decimal::Decimal;
use storefront_core::models::{Product, ProductInput, Viewer};
use storefront_core::{JobReceiver, MemoryCache, MemoryStorage, TaskQueue};
use storefront_server::config::AppConfig;
use storefront_server::services::auth_service;
use storefront_server::state::AppState;

pub struct TestApp {
  pub state: AppState,
  pub storage: Arc<MemoryStorage>,
  pub jobs: JobReceiver,
}

pub fn test_app() -> TestApp {
  let storage = Arc::new(MemoryStorage::new());
  let (queue, jobs) = TaskQueue::channel();
  let config = AppConfig {
    media_root: std::env::temp_dir().join("storefront-server-tests"),
    ..AppConfig::default()
  };
  let state = AppState::new(config, storage.clone(), Arc::new(MemoryCache::new()), Arc::new(queue));
  TestApp { state, storage, jobs }
}

/// Builds the actix service over a state, with trailing slashes normalized
/// the same way the server does.
macro_rules! init_app {
  ($state:expr) => {
    actix_web::test::init_service(
      actix_web::App::new()
        .app_data(actix_web::web::Data::new($state.clone()))
        .wrap(actix_web::middleware::NormalizePath::trim())
        .configure(storefront_server::web::configure_app_routes),
    )
    .await
  };
}

pub fn dec(raw: &str) -> Decimal {
  raw.parse().unwrap()
}

/// Parses a decimal serialized either as a JSON string or number.
pub fn json_dec(value: &serde_json::Value) -> Decimal {
  match value {
    serde_json::Value::String(raw) => dec(raw),
    other => dec(&other.to_string()),
  }
}

pub async fn seed_product(app: &TestApp, name: &str, price: &str) -> Product {
  app
    .state
    .catalog
    .create_product(ProductInput {
      name: name.to_string(),
      price: dec(price),
      description: None,
      is_18_plus: false,
      category_id: None,
      tag_ids: Vec::new(),
      image: None,
      manual: None,
    })
    .await
    .unwrap()
}

/// Creates a user with password `pw` and returns its viewer and API token.
pub async fn seed_user(app: &TestApp, username: &str, is_superuser: bool) -> (Viewer, String) {
  let email = format!("{}@example.com", username);
  let user = auth_service::create_user(app.storage.as_ref(), username, &email, "pw", is_superuser)
    .await
    .unwrap();
  let token = auth_service::issue_token(app.storage.as_ref(), username, "pw").await.unwrap();
  (Viewer::from(&user), token)
}

pub fn token_header(token: &str) -> (&'static str, String) {
  ("Authorization", format!("Token {}", token))
}
