// storefront_core/src/services/orders.rs

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::ServiceSettings;
use crate::cache::{self, keys, Cache};
use crate::error::{CoreError, CoreResult};
use crate::jobs::{Job, JobQueue};
use crate::models::{LineItemInput, LineItemView, NewLineItem, Order, OrderPrefetch, OrderView, Viewer};
use crate::pricing;
use crate::storage::Storage;

pub const UNAUTHENTICATED_ORDER: &str = "You must be authenticated to create an order";
pub const MISSING_PRODUCTS: &str = "Some products do not exist";

#[derive(Clone)]
pub struct OrderService {
  storage: Arc<dyn Storage>,
  cache: Arc<dyn Cache>,
  jobs: Arc<dyn JobQueue>,
  settings: ServiceSettings,
}

impl OrderService {
  pub fn new(
    storage: Arc<dyn Storage>,
    cache: Arc<dyn Cache>,
    jobs: Arc<dyn JobQueue>,
    settings: ServiceSettings,
  ) -> Self {
    Self { storage, cache, jobs, settings }
  }

  /// Orders visible to the viewer, newest first.
  ///
  /// Only the fully loaded listing of a regular user is cached; superuser
  /// listings span every user's orders and are always read from storage.
  #[instrument(name = "orders::list_orders", skip(self, viewer), fields(user_id = viewer.user_id))]
  pub async fn list_orders(&self, viewer: &Viewer, prefetch: OrderPrefetch) -> CoreResult<Vec<OrderView>> {
    let cache_key =
      (!viewer.is_superuser && prefetch == OrderPrefetch::LineItemsWithProducts).then(|| keys::orders(viewer.user_id));

    if let Some(key) = cache_key.as_deref() {
      if let Some(cached) = cache::get_json::<Vec<OrderView>>(self.cache.as_ref(), key).await {
        return Ok(cached);
      }
    }

    let owner = (!viewer.is_superuser).then_some(viewer.user_id);
    let orders = self.storage.list_orders(owner).await?;
    let views = self.attach_relations(orders, prefetch).await?;

    if let Some(key) = cache_key.as_deref() {
      cache::set_json(self.cache.as_ref(), key, &views, Some(self.settings.cache_ttl)).await;
    }
    Ok(views)
  }

  #[instrument(name = "orders::get_order", skip(self, viewer), fields(user_id = viewer.user_id))]
  pub async fn get_order(&self, viewer: &Viewer, id: Uuid) -> CoreResult<OrderView> {
    let order = self.visible_order(viewer, id).await?;
    let mut views = self.attach_relations(vec![order], OrderPrefetch::LineItemsWithProducts).await?;
    views
      .pop()
      .ok_or_else(|| CoreError::Internal(format!("Order {} lost while loading relations.", id)))
  }

  /// Creates an order and all of its line items in one transaction.
  ///
  /// Products are resolved with a single bulk lookup and line items are
  /// inserted with a single bulk statement, so the number of queries does not
  /// depend on the number of items. Prices are derived from current product
  /// prices; any caller-supplied price is ignored.
  #[instrument(name = "orders::create_order", skip(self, viewer, items), fields(items = items.len()))]
  pub async fn create_order(&self, viewer: Option<&Viewer>, items: Vec<LineItemInput>) -> CoreResult<OrderView> {
    let viewer = viewer.ok_or_else(|| CoreError::Unauthorized(UNAUTHENTICATED_ORDER.to_string()))?;
    if items.is_empty() {
      return Err(CoreError::Validation("An order must contain at least one product.".to_string()));
    }
    for item in &items {
      pricing::validate_quantity(item.quantity)?;
    }

    let product_ids: Vec<i64> = items
      .iter()
      .map(|item| item.product_id)
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect();
    let products = self.storage.products_in_bulk(&product_ids).await?;
    if products.len() != product_ids.len() {
      warn!(
        requested = product_ids.len(),
        found = products.len(),
        "Order references products that do not exist."
      );
      return Err(CoreError::Validation(MISSING_PRODUCTS.to_string()));
    }

    let new_items = items
      .iter()
      .map(|item| {
        let product = products
          .get(&item.product_id)
          .ok_or_else(|| CoreError::Validation(MISSING_PRODUCTS.to_string()))?;
        Ok(NewLineItem {
          product_id: product.id,
          quantity: item.quantity,
          price: pricing::checked_line_price(product.price, item.quantity)?,
        })
      })
      .collect::<CoreResult<Vec<_>>>()?;
    pricing::checked_order_total(new_items.iter().map(|item| item.price))?;

    let (order, line_items) = self.storage.create_order(viewer.user_id, new_items).await?;
    info!(order_id = %order.id, total = ?order.total_price, "Order created.");

    cache::invalidate(self.cache.as_ref(), &keys::orders(order.user_id)).await;
    self.enqueue_after_create(order.id).await;

    let line_items = line_items
      .into_iter()
      .map(|item| LineItemView { product: products.get(&item.product_id).cloned(), item })
      .collect();
    Ok(OrderView { order, line_items: Some(line_items) })
  }

  #[instrument(name = "orders::add_line_item", skip(self, viewer, input), fields(user_id = viewer.user_id))]
  pub async fn add_line_item(&self, viewer: &Viewer, order_id: Uuid, input: LineItemInput) -> CoreResult<OrderView> {
    let order = self.visible_order(viewer, order_id).await?;
    pricing::validate_quantity(input.quantity)?;
    self
      .storage
      .insert_line_item(order.id, input.product_id, input.quantity)
      .await?
      .ok_or_else(|| order_not_found(order_id))?;
    self.after_line_item_write(viewer, order).await
  }

  /// The line price is re-derived from the product's current price.
  #[instrument(name = "orders::update_line_item", skip(self, viewer), fields(user_id = viewer.user_id))]
  pub async fn update_line_item(
    &self,
    viewer: &Viewer,
    order_id: Uuid,
    item_id: i64,
    quantity: rust_decimal::Decimal,
  ) -> CoreResult<OrderView> {
    let order = self.visible_order(viewer, order_id).await?;
    pricing::validate_quantity(quantity)?;
    self
      .storage
      .update_line_item(order_id, item_id, quantity)
      .await?
      .ok_or_else(|| line_item_not_found(item_id))?;
    self.after_line_item_write(viewer, order).await
  }

  #[instrument(name = "orders::remove_line_item", skip(self, viewer), fields(user_id = viewer.user_id))]
  pub async fn remove_line_item(&self, viewer: &Viewer, order_id: Uuid, item_id: i64) -> CoreResult<OrderView> {
    let order = self.visible_order(viewer, order_id).await?;
    self
      .storage
      .delete_line_item(order_id, item_id)
      .await?
      .ok_or_else(|| line_item_not_found(item_id))?;
    self.after_line_item_write(viewer, order).await
  }

  #[instrument(name = "orders::delete_order", skip(self, viewer), fields(user_id = viewer.user_id))]
  pub async fn delete_order(&self, viewer: &Viewer, id: Uuid) -> CoreResult<()> {
    let order = self.visible_order(viewer, id).await?;
    if !self.storage.delete_order(id).await? {
      return Err(order_not_found(id));
    }
    info!(order_id = %id, "Order deleted.");
    cache::invalidate(self.cache.as_ref(), &keys::orders(order.user_id)).await;
    Ok(())
  }

  /// Other users' orders are reported as missing rather than forbidden.
  async fn visible_order(&self, viewer: &Viewer, id: Uuid) -> CoreResult<Order> {
    match self.storage.get_order(id).await? {
      Some(order) if viewer.is_superuser || order.user_id == viewer.user_id => Ok(order),
      _ => Err(order_not_found(id)),
    }
  }

  async fn after_line_item_write(&self, viewer: &Viewer, order: Order) -> CoreResult<OrderView> {
    cache::invalidate(self.cache.as_ref(), &keys::orders(order.user_id)).await;
    self.get_order(viewer, order.id).await
  }

  /// Failures here are logged only; the order is already committed.
  async fn enqueue_after_create(&self, order_id: Uuid) {
    for job in [Job::OrderCreatedNotification { order_id }, Job::RefreshOrdersReport] {
      let name = job.name();
      if let Err(e) = self.jobs.enqueue(job).await {
        warn!(%order_id, job = name, error = %e, "Could not enqueue background job.");
      }
    }
  }

  /// Loads line items and products for a batch of orders, one bulk query per level.
  async fn attach_relations(&self, orders: Vec<Order>, prefetch: OrderPrefetch) -> CoreResult<Vec<OrderView>> {
    if prefetch == OrderPrefetch::None || orders.is_empty() {
      return Ok(orders.into_iter().map(OrderView::bare).collect());
    }

    let order_ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();
    let items = self.storage.line_items_for_orders(&order_ids).await?;

    let products = if prefetch == OrderPrefetch::LineItemsWithProducts && !items.is_empty() {
      let product_ids: Vec<i64> = items
        .iter()
        .map(|item| item.product_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
      self.storage.products_in_bulk(&product_ids).await?
    } else {
      HashMap::new()
    };

    let mut grouped: HashMap<Uuid, Vec<LineItemView>> = HashMap::new();
    for item in items {
      let product = products.get(&item.product_id).cloned();
      grouped.entry(item.order_id).or_default().push(LineItemView { item, product });
    }

    Ok(
      orders
        .into_iter()
        .map(|order| {
          let line_items = grouped.remove(&order.id).unwrap_or_default();
          OrderView { order, line_items: Some(line_items) }
        })
        .collect(),
    )
  }
}

fn order_not_found(id: Uuid) -> CoreError {
  CoreError::NotFound(format!("Order {} not found.", id))
}

fn line_item_not_found(id: i64) -> CoreError {
  CoreError::NotFound(format!("Line item {} not found.", id))
}
