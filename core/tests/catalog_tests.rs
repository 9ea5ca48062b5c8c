// tests/catalog_tests.rs
mod common;

use common::*;
use std::sync::Arc;
use storefront_core::cache::keys;
use storefront_core::models::{LineItemInput, OrderPrefetch, ProductPatch};
use storefront_core::{
  CatalogService, CoreError, MediaRoot, MemoryStorage, OrderService, ProductQuery, ServiceSettings,
  TaskQueue,
};

#[tokio::test]
async fn listing_filters_and_orders_products() {
  let h = harness();
  let category = h.catalog.create_category("Drinks").await.unwrap();
  for (name, price) in [("Red Wine", "12.00"), ("White Wine", "9.50"), ("Bread", "2.00")] {
    let mut input = product_input(name, price);
    if name.contains("Wine") {
      input.category_id = Some(category.id);
    }
    h.catalog.create_product(input).await.unwrap();
  }

  let wines = ProductQuery { search: Some("wine".into()), ordering: Some("-price".into()), ..ProductQuery::default() };
  let page = h.catalog.list_products(&wines, None).await.unwrap();
  let names: Vec<_> = page.results.iter().map(|p| p.name.as_str()).collect();
  assert_eq!(names, vec!["Red Wine", "White Wine"]);

  let cheap = ProductQuery { price_max: Some(dec("10.00")), ..ProductQuery::default() };
  assert_eq!(h.catalog.list_products(&cheap, None).await.unwrap().count, 2);

  let in_category = ProductQuery { category: Some(category.id), price_min: Some(dec("10")), ..ProductQuery::default() };
  let page = h.catalog.list_products(&in_category, None).await.unwrap();
  assert_eq!(page.count, 1);
  assert_eq!(page.results[0].name, "Red Wine");

  let bad = ProductQuery { ordering: Some("stock".into()), ..ProductQuery::default() };
  assert!(matches!(h.catalog.list_products(&bad, None).await, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn listing_is_paginated() {
  let h = harness();
  for n in 0..23 {
    seed_product(&h.storage, &format!("Item {:02}", n), "1.00").await;
  }
  let query = ProductQuery::default();

  let first = h.catalog.list_products(&query, None).await.unwrap();
  assert_eq!(first.count, 23);
  assert_eq!(first.results.len(), 10);
  assert_eq!((first.previous, first.next), (None, Some(2)));

  let last = h.catalog.list_products(&query, Some(3)).await.unwrap();
  assert_eq!(last.results.len(), 3);
  assert_eq!((last.previous, last.next), (Some(2), None));

  assert!(matches!(h.catalog.list_products(&query, Some(4)).await, Err(CoreError::NotFound(_))));
  assert!(matches!(h.catalog.list_products(&query, Some(0)).await, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn product_names_are_unique() {
  let h = harness();
  h.catalog.create_product(product_input("Lamp", "4.00")).await.unwrap();
  assert!(matches!(
    h.catalog.create_product(product_input("Lamp", "5.00")).await,
    Err(CoreError::Conflict(_))
  ));
}

#[tokio::test]
async fn invalid_products_are_rejected() {
  let h = harness();
  assert!(matches!(
    h.catalog.create_product(product_input("   ", "4.00")).await,
    Err(CoreError::Validation(_))
  ));
  assert!(matches!(
    h.catalog.create_product(product_input("Lamp", "-1.00")).await,
    Err(CoreError::Validation(_))
  ));
  assert!(matches!(
    h.catalog.create_product(product_input("Lamp", "1.005")).await,
    Err(CoreError::Validation(_))
  ));
  let mut unknown_category = product_input("Lamp", "1.00");
  unknown_category.category_id = Some(42);
  assert!(matches!(
    h.catalog.create_product(unknown_category).await,
    Err(CoreError::Validation(_))
  ));
}

#[tokio::test]
async fn patch_only_touches_present_fields() {
  let h = harness();
  let mut input = product_input("Lamp", "4.00");
  input.description = Some("Bright".into());
  let lamp = h.catalog.create_product(input).await.unwrap();

  let patch: ProductPatch = serde_json::from_str(r#"{"price": "5.25"}"#).unwrap();
  let patched = h.catalog.patch_product(lamp.id, patch).await.unwrap();
  assert_eq!(patched.price, dec("5.25"));
  assert_eq!(patched.description.as_deref(), Some("Bright"));

  let patch: ProductPatch = serde_json::from_str(r#"{"description": null}"#).unwrap();
  let cleared = h.catalog.patch_product(lamp.id, patch).await.unwrap();
  assert_eq!(cleared.description, None);

  assert!(matches!(
    h.catalog.patch_product(9_999, ProductPatch::default()).await,
    Err(CoreError::NotFound(_))
  ));
}

#[tokio::test]
async fn popular_products_rank_by_ordered_quantity() {
  let h = harness();
  let (_, viewer) = seed_user(&h.storage, "alice", false).await;
  let a = seed_product(&h.storage, "A", "1.00").await;
  let b = seed_product(&h.storage, "B", "1.00").await;
  let c = seed_product(&h.storage, "C", "1.00").await;
  let line = |product_id, quantity: &str| LineItemInput { product_id, quantity: dec(quantity), price: None };

  h.orders
    .create_order(Some(&viewer), vec![line(b.id, "3"), line(c.id, "1.5")])
    .await
    .unwrap();
  h.orders.create_order(Some(&viewer), vec![line(c.id, "1.5")]).await.unwrap();

  let ranked = h.catalog.popular_products().await.unwrap();
  let order: Vec<_> = ranked.iter().map(|p| (p.product.id, p.total_quantity)).collect();
  // b and c tie at 3; ties break by id.
  assert_eq!(order[0], (b.id, dec("3")));
  assert_eq!(order[1], (c.id, dec("3")));
  assert_eq!(order[2], (a.id, dec("0")));
}

#[tokio::test]
async fn popular_products_are_limited_to_ten() {
  let h = harness();
  for n in 0..12 {
    seed_product(&h.storage, &format!("P{}", n), "1.00").await;
  }
  assert_eq!(h.catalog.popular_products().await.unwrap().len(), 10);
}

#[tokio::test]
async fn popular_products_are_served_from_cache_until_a_product_write() {
  let h = harness();
  seed_product(&h.storage, "A", "1.00").await;

  h.catalog.popular_products().await.unwrap();
  assert!(h.cache.contains(keys::POPULAR_PRODUCTS));

  h.storage.reset_executed();
  h.catalog.popular_products().await.unwrap();
  assert!(h.storage.executed().is_empty());

  h.catalog.create_product(product_input("B", "2.00")).await.unwrap();
  assert!(!h.cache.contains(keys::POPULAR_PRODUCTS));

  let ranked = h.catalog.popular_products().await.unwrap();
  assert_eq!(ranked.len(), 2);
}

#[tokio::test]
async fn order_lists_are_cached_per_user_and_invalidated_on_writes() {
  let h = harness();
  let (alice_user, alice) = seed_user(&h.storage, "alice", false).await;
  let lamp = seed_product(&h.storage, "Lamp", "4.00").await;
  let line = LineItemInput { product_id: lamp.id, quantity: dec("1"), price: None };
  h.orders.create_order(Some(&alice), vec![line.clone()]).await.unwrap();

  let key = keys::orders(alice_user.id);
  let listed = h.orders.list_orders(&alice, OrderPrefetch::LineItemsWithProducts).await.unwrap();
  assert!(h.cache.contains(&key));

  h.storage.reset_executed();
  let cached = h.orders.list_orders(&alice, OrderPrefetch::LineItemsWithProducts).await.unwrap();
  assert_eq!(cached, listed);
  assert!(h.storage.executed().is_empty());

  // Creating an order drops the owner's list.
  h.orders.create_order(Some(&alice), vec![line]).await.unwrap();
  assert!(!h.cache.contains(&key));

  // So does any product write, since product data is embedded in the list.
  h.orders.list_orders(&alice, OrderPrefetch::LineItemsWithProducts).await.unwrap();
  let patch: ProductPatch = serde_json::from_str(r#"{"price": "6.00"}"#).unwrap();
  h.catalog.patch_product(lamp.id, patch).await.unwrap();
  assert!(!h.cache.contains(&key));

  let fresh = h.orders.list_orders(&alice, OrderPrefetch::LineItemsWithProducts).await.unwrap();
  let product = fresh[0].line_items.as_ref().unwrap()[0].product.as_ref().unwrap();
  assert_eq!(product.price, dec("6.00"));
}

#[tokio::test]
async fn superuser_listings_are_never_cached() {
  let h = harness();
  let (admin_user, admin) = seed_user(&h.storage, "admin", true).await;
  let lamp = seed_product(&h.storage, "Lamp", "4.00").await;
  let line = LineItemInput { product_id: lamp.id, quantity: dec("1"), price: None };
  h.orders.create_order(Some(&admin), vec![line]).await.unwrap();

  h.orders.list_orders(&admin, OrderPrefetch::LineItemsWithProducts).await.unwrap();
  assert!(!h.cache.contains(&keys::orders(admin_user.id)));
}

#[tokio::test]
async fn a_failing_cache_falls_back_to_storage() {
  setup_tracing();
  let storage = Arc::new(MemoryStorage::new());
  let cache = Arc::new(FailingCache);
  let (queue, _jobs) = TaskQueue::channel();
  let settings = ServiceSettings::default();
  let media = MediaRoot::new(std::env::temp_dir());
  let catalog = CatalogService::new(storage.clone(), cache.clone(), media, settings);
  let orders = OrderService::new(storage.clone(), cache, Arc::new(queue), settings);

  let (_, viewer) = seed_user(&storage, "alice", false).await;
  let lamp = catalog.create_product(product_input("Lamp", "4.00")).await.unwrap();
  let line = LineItemInput { product_id: lamp.id, quantity: dec("2"), price: None };
  orders.create_order(Some(&viewer), vec![line]).await.unwrap();

  let ranked = catalog.popular_products().await.unwrap();
  assert_eq!(ranked[0].total_quantity, dec("2"));
  let listed = orders.list_orders(&viewer, OrderPrefetch::LineItemsWithProducts).await.unwrap();
  assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn bulk_delete_ignores_unknown_ids() {
  let h = harness();
  let a = seed_product(&h.storage, "A", "1.00").await;
  let b = seed_product(&h.storage, "B", "1.00").await;
  assert_eq!(h.catalog.delete_products(&[a.id, b.id, 777]).await.unwrap(), 2);
  assert_eq!(h.catalog.delete_products(&[]).await.unwrap(), 0);
  assert!(matches!(h.catalog.delete_product(a.id).await, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn categories_and_tags_reject_blank_names() {
  let h = harness();
  assert!(matches!(h.catalog.create_tag("  ").await, Err(CoreError::Validation(_))));
  let tag = h.catalog.create_tag(" sale ").await.unwrap();
  assert_eq!(tag.name, "sale");
  assert_eq!(h.catalog.list_tags().await.unwrap(), vec![tag]);
}
