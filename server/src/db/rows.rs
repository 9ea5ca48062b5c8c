// storefront_server/src/db/rows.rs

//! Row shapes returned by the Postgres queries, mapped into domain records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use storefront_core::models::{Category, LineItem, Order, PopularProduct, Product, Session, Tag, User};

/// Column list matching [`ProductRow`]; expects the table aliased as `p`.
pub const PRODUCT_COLUMNS: &str = "p.id, p.name, p.price, p.description, p.is_18_plus, p.category_id, \
   ARRAY(SELECT pt.tag_id FROM product_tags pt WHERE pt.product_id = p.id ORDER BY pt.tag_id) AS tag_ids, \
   p.image, p.thumbnail, p.manual, p.created_at, p.updated_at";

pub const ORDER_COLUMNS: &str = "id, user_id, total_price, created_at, updated_at";
pub const LINE_ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, price";
pub const USER_COLUMNS: &str = "u.id, u.username, u.email, u.password_hash, u.is_superuser, u.created_at";

#[derive(Debug, FromRow)]
pub struct ProductRow {
  pub id: i64,
  pub name: String,
  pub price: Decimal,
  pub description: Option<String>,
  pub is_18_plus: bool,
  pub category_id: Option<i64>,
  pub tag_ids: Vec<i64>,
  pub image: Option<String>,
  pub thumbnail: Option<String>,
  pub manual: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
  fn from(row: ProductRow) -> Self {
    Product {
      id: row.id,
      name: row.name,
      price: row.price,
      description: row.description,
      is_18_plus: row.is_18_plus,
      category_id: row.category_id,
      tag_ids: row.tag_ids,
      image: row.image,
      thumbnail: row.thumbnail,
      manual: row.manual,
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}

#[derive(Debug, FromRow)]
pub struct PopularProductRow {
  #[sqlx(flatten)]
  pub product: ProductRow,
  pub total_quantity: Decimal,
}

impl From<PopularProductRow> for PopularProduct {
  fn from(row: PopularProductRow) -> Self {
    PopularProduct { product: row.product.into(), total_quantity: row.total_quantity }
  }
}

#[derive(Debug, FromRow)]
pub struct NamedRow {
  pub id: i64,
  pub name: String,
}

impl From<NamedRow> for Category {
  fn from(row: NamedRow) -> Self {
    Category { id: row.id, name: row.name }
  }
}

impl From<NamedRow> for Tag {
  fn from(row: NamedRow) -> Self {
    Tag { id: row.id, name: row.name }
  }
}

#[derive(Debug, FromRow)]
pub struct OrderRow {
  pub id: Uuid,
  pub user_id: i64,
  pub total_price: Option<Decimal>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
  fn from(row: OrderRow) -> Self {
    Order {
      id: row.id,
      user_id: row.user_id,
      total_price: row.total_price,
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}

#[derive(Debug, FromRow)]
pub struct LineItemRow {
  pub id: i64,
  pub order_id: Uuid,
  pub product_id: i64,
  pub quantity: Decimal,
  pub price: Decimal,
}

impl From<LineItemRow> for LineItem {
  fn from(row: LineItemRow) -> Self {
    LineItem {
      id: row.id,
      order_id: row.order_id,
      product_id: row.product_id,
      quantity: row.quantity,
      price: row.price,
    }
  }
}

#[derive(Debug, FromRow)]
pub struct UserRow {
  pub id: i64,
  pub username: String,
  pub email: String,
  pub password_hash: String,
  pub is_superuser: bool,
  pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
  fn from(row: UserRow) -> Self {
    User {
      id: row.id,
      username: row.username,
      email: row.email,
      password_hash: row.password_hash,
      is_superuser: row.is_superuser,
      created_at: row.created_at,
    }
  }
}

#[derive(Debug, FromRow)]
pub struct SessionRow {
  pub key: String,
  pub user_id: i64,
  pub expires_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
  fn from(row: SessionRow) -> Self {
    Session { key: row.key, user_id: row.user_id, expires_at: row.expires_at }
  }
}
