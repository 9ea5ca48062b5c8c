// storefront_server/src/graphql/types.rs

use async_graphql::{InputObject, Object, SimpleObject, ID};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use storefront_core::models::{LineItemView, OrderView, PopularProduct, Product as CoreProduct};
use storefront_core::{Page, ProductQuery};

/// GraphQL representation of a Product
#[derive(Clone)]
pub struct Product {
  pub inner: CoreProduct,
}

impl From<CoreProduct> for Product {
  fn from(product: CoreProduct) -> Self {
    Self { inner: product }
  }
}

#[Object]
impl Product {
  async fn id(&self) -> ID {
    ID(self.inner.id.to_string())
  }

  /// The numeric primary key
  async fn decoded_id(&self) -> i64 {
    self.inner.id
  }

  async fn name(&self) -> &str {
    &self.inner.name
  }

  async fn price(&self) -> Decimal {
    self.inner.price
  }

  async fn description(&self) -> Option<&str> {
    self.inner.description.as_deref()
  }

  /// Whether buying the product requires being an adult
  async fn is_18_plus(&self) -> bool {
    self.inner.is_18_plus
  }

  async fn category_id(&self) -> Option<i64> {
    self.inner.category_id
  }

  async fn tag_ids(&self) -> Vec<i64> {
    self.inner.tag_ids.clone()
  }

  async fn image(&self) -> Option<&str> {
    self.inner.image.as_deref()
  }

  /// Path of the derived thumbnail, relative to the media root
  async fn thumbnail(&self) -> Option<&str> {
    self.inner.thumbnail.as_deref()
  }

  async fn manual(&self) -> Option<&str> {
    self.inner.manual.as_deref()
  }

  async fn created_at(&self) -> DateTime<Utc> {
    self.inner.created_at
  }

  async fn updated_at(&self) -> DateTime<Utc> {
    self.inner.updated_at
  }
}

#[derive(SimpleObject)]
pub struct PopularProductEntry {
  pub product: Product,
  pub total_quantity: Decimal,
}

impl From<PopularProduct> for PopularProductEntry {
  fn from(entry: PopularProduct) -> Self {
    Self { product: entry.product.into(), total_quantity: entry.total_quantity }
  }
}

#[derive(SimpleObject)]
pub struct ProductPage {
  pub count: u64,
  pub next: Option<u32>,
  pub previous: Option<u32>,
  pub results: Vec<Product>,
}

impl From<Page<CoreProduct>> for ProductPage {
  fn from(page: Page<CoreProduct>) -> Self {
    let page = page.map(Product::from);
    Self { count: page.count, next: page.next, previous: page.previous, results: page.results }
  }
}

/// A line item of an order
#[derive(Clone)]
pub struct OrderProduct {
  pub inner: LineItemView,
}

#[Object]
impl OrderProduct {
  async fn id(&self) -> ID {
    ID(self.inner.item.id.to_string())
  }

  async fn product_id(&self) -> i64 {
    self.inner.item.product_id
  }

  async fn quantity(&self) -> Decimal {
    self.inner.item.quantity
  }

  /// Unit price times quantity at the time of the last write
  async fn price(&self) -> Decimal {
    self.inner.item.price
  }

  /// Null unless products were loaded with the order.
  async fn product(&self) -> Option<Product> {
    self.inner.product.clone().map(Product::from)
  }
}

#[derive(Clone)]
pub struct Order {
  pub inner: OrderView,
}

impl From<OrderView> for Order {
  fn from(view: OrderView) -> Self {
    Self { inner: view }
  }
}

#[Object]
impl Order {
  async fn uuid(&self) -> Uuid {
    self.inner.order.id
  }

  async fn user_id(&self) -> i64 {
    self.inner.order.user_id
  }

  async fn total_price(&self) -> Option<Decimal> {
    self.inner.order.total_price
  }

  /// Sum of line-item quantities; null when line items were not loaded.
  async fn total_quantity(&self) -> Option<Decimal> {
    self.inner.total_quantity()
  }

  async fn created_at(&self) -> DateTime<Utc> {
    self.inner.order.created_at
  }

  async fn updated_at(&self) -> DateTime<Utc> {
    self.inner.order.updated_at
  }

  async fn order_products(&self) -> Vec<OrderProduct> {
    self
      .inner
      .line_items
      .iter()
      .flatten()
      .cloned()
      .map(|inner| OrderProduct { inner })
      .collect()
  }
}

#[derive(InputObject, Default)]
pub struct ProductFilter {
  pub id: Option<i64>,
  pub name: Option<String>,
  pub price: Option<Decimal>,
  pub price_min: Option<Decimal>,
  pub price_max: Option<Decimal>,
  pub category: Option<i64>,
  pub search: Option<String>,
  /// `name`, `price` or `id`, prefixed with `-` for descending order
  pub ordering: Option<String>,
}

impl From<ProductFilter> for ProductQuery {
  fn from(filter: ProductFilter) -> Self {
    ProductQuery {
      id: filter.id,
      name: filter.name,
      price: filter.price,
      price_min: filter.price_min,
      price_max: filter.price_max,
      category: filter.category,
      search: filter.search,
      ordering: filter.ordering,
    }
  }
}

#[derive(InputObject)]
pub struct CreateOrderProductInput {
  pub product_id: ID,
  pub quantity: Decimal,
  /// Ignored; line prices are always derived from the product price.
  pub price: Option<Decimal>,
}

#[derive(SimpleObject)]
pub struct CreateOrderPayload {
  pub order: Order,
}
