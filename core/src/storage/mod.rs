// storefront_core/src/storage/mod.rs

//! The relational store seam.
//!
//! Every method maps to a bounded number of statements; multi-row writes run
//! in a single transaction. Line-item writes recompute the parent order's
//! total inside that same transaction, serialized per order.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Duration;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::{
  Category, LineItem, NewLineItem, NewUser, Order, OrdersReport, PopularProduct, Product, ProductWrite, Session, Tag,
  User,
};
use crate::query::{Page, PageRequest, ProductQuery};

pub mod memory;

pub use memory::MemoryStorage;

#[async_trait]
pub trait Storage: Send + Sync {
  // Catalog
  async fn list_products(&self, query: &ProductQuery, page: PageRequest) -> CoreResult<Page<Product>>;
  async fn get_product(&self, id: i64) -> CoreResult<Option<Product>>;
  /// One bulk lookup; ids that do not exist are simply absent from the map.
  async fn products_in_bulk(&self, ids: &[i64]) -> CoreResult<HashMap<i64, Product>>;
  async fn insert_product(&self, product: ProductWrite) -> CoreResult<Product>;
  async fn update_product(&self, id: i64, product: ProductWrite) -> CoreResult<Option<Product>>;
  /// Returns how many products were deleted. Their line items cascade.
  async fn delete_products(&self, ids: &[i64]) -> CoreResult<u64>;
  /// Ranked by total ordered quantity descending, then id ascending.
  async fn popular_products(&self, limit: u32) -> CoreResult<Vec<PopularProduct>>;
  async fn list_categories(&self) -> CoreResult<Vec<Category>>;
  async fn insert_category(&self, name: &str) -> CoreResult<Category>;
  async fn list_tags(&self) -> CoreResult<Vec<Tag>>;
  async fn insert_tag(&self, name: &str) -> CoreResult<Tag>;

  // Orders
  /// Newest first. `owner = None` lists every order.
  async fn list_orders(&self, owner: Option<i64>) -> CoreResult<Vec<Order>>;
  async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>>;
  async fn line_items_for_orders(&self, order_ids: &[Uuid]) -> CoreResult<Vec<LineItem>>;
  /// Inserts the order, bulk inserts its line items and persists the total,
  /// all in one transaction.
  async fn create_order(&self, user_id: i64, items: Vec<NewLineItem>) -> CoreResult<(Order, Vec<LineItem>)>;
  /// Adds a line item priced from the product's current price, read under the
  /// same order lock as the insert. `None` when the order does not exist.
  async fn insert_line_item(
    &self,
    order_id: Uuid,
    product_id: i64,
    quantity: Decimal,
  ) -> CoreResult<Option<(Order, LineItem)>>;
  /// Changes the quantity and re-derives the price the same way.
  async fn update_line_item(
    &self,
    order_id: Uuid,
    item_id: i64,
    quantity: Decimal,
  ) -> CoreResult<Option<(Order, LineItem)>>;
  async fn delete_line_item(&self, order_id: Uuid, item_id: i64) -> CoreResult<Option<Order>>;
  async fn delete_order(&self, id: Uuid) -> CoreResult<bool>;
  async fn orders_report(&self) -> CoreResult<OrdersReport>;

  // Accounts
  async fn insert_user(&self, user: NewUser) -> CoreResult<User>;
  async fn get_user(&self, id: i64) -> CoreResult<Option<User>>;
  async fn find_user_by_username(&self, username: &str) -> CoreResult<Option<User>>;
  /// Returns the user's existing token key, creating one on first use.
  async fn get_or_create_token(&self, user_id: i64) -> CoreResult<String>;
  async fn user_for_token(&self, key: &str) -> CoreResult<Option<User>>;
  /// Also deletes every session that has already expired.
  async fn insert_session(&self, user_id: i64, ttl: Duration) -> CoreResult<Session>;
  /// Expired sessions resolve to `None`.
  async fn user_for_session(&self, key: &str) -> CoreResult<Option<User>>;
  async fn delete_session(&self, key: &str) -> CoreResult<()>;
}
