// storefront_core/src/models/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::Product;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
  pub id: Uuid,
  pub user_id: i64,
  /// `None` until the first total recomputation.
  pub total_price: Option<Decimal>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// An order-product association carrying the quantity and a price snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
  pub id: i64,
  pub order_id: Uuid,
  pub product_id: i64,
  pub quantity: Decimal,
  pub price: Decimal,
}

/// A line item ready to persist, with its price already derived.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLineItem {
  pub product_id: i64,
  pub quantity: Decimal,
  pub price: Decimal,
}

/// A line item as submitted by a caller. `price` is accepted for compatibility
/// with clients that echo it back and is never persisted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LineItemInput {
  #[serde(alias = "product")]
  pub product_id: i64,
  pub quantity: Decimal,
  #[serde(default)]
  pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemView {
  #[serde(flatten)]
  pub item: LineItem,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub product: Option<Product>,
}

/// An order together with whatever relations were loaded for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
  #[serde(flatten)]
  pub order: Order,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub line_items: Option<Vec<LineItemView>>,
}

impl OrderView {
  pub fn bare(order: Order) -> Self {
    Self { order, line_items: None }
  }

  /// Sum of line-item quantities, available once line items are loaded.
  pub fn total_quantity(&self) -> Option<Decimal> {
    self
      .line_items
      .as_ref()
      .map(|items| items.iter().map(|view| view.item.quantity).sum())
  }
}

/// How much of an order's relations to load alongside it. Each level adds
/// exactly one bulk query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPrefetch {
  None,
  LineItems,
  LineItemsWithProducts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdersReport {
  pub order_count: i64,
  pub revenue_total: Decimal,
  pub generated_at: DateTime<Utc>,
}
