// storefront_server/src/db/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use storefront_core::models::{
  generate_key, Category, LineItem, NewLineItem, NewUser, Order, OrdersReport, PopularProduct, Product, ProductWrite,
  Session, Tag, User,
};
use storefront_core::pricing;
use storefront_core::query::{Page, PageRequest, ProductQuery};
use storefront_core::services::orders::MISSING_PRODUCTS;
use storefront_core::{CoreError, CoreResult, Storage};

use super::rows::{
  LineItemRow, NamedRow, OrderRow, PopularProductRow, ProductRow, SessionRow, UserRow, LINE_ITEM_COLUMNS,
  ORDER_COLUMNS, PRODUCT_COLUMNS, USER_COLUMNS,
};

/// Postgres-backed [`Storage`]. Multi-row writes run in one transaction and
/// line-item writes lock the parent order row before recomputing its total.
#[derive(Clone)]
pub struct PgStorage {
  pool: PgPool,
}

impl PgStorage {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  async fn product_in(&self, tx: &mut Transaction<'_, Postgres>, id: i64) -> CoreResult<Product> {
    let row: ProductRow = sqlx::query_as(&format!("SELECT {} FROM products p WHERE p.id = $1", PRODUCT_COLUMNS))
      .bind(id)
      .fetch_one(&mut **tx)
      .await
      .map_err(db_error)?;
    Ok(row.into())
  }
}

/// Maps constraint violations to domain errors; anything else is a storage failure.
fn db_error(err: sqlx::Error) -> CoreError {
  if let sqlx::Error::Database(db) = &err {
    match db.code().as_deref() {
      Some("23505") => {
        let message = match db.constraint() {
          Some("products_name_key") => "Product with this name already exists.",
          Some("products_thumbnail_key") => "Another product already uses this thumbnail.",
          Some("users_username_key") => "A user with that username already exists.",
          _ => "A record with these values already exists.",
        };
        return CoreError::Conflict(message.to_string());
      }
      Some("23503") => return CoreError::Validation("A referenced record does not exist.".to_string()),
      Some("23514") => return CoreError::Validation(db.message().to_string()),
      // numeric_value_out_of_range, e.g. a derived price wider than NUMERIC(10, 2)
      Some("22003") => return CoreError::Validation(pricing::AMOUNT_OUT_OF_RANGE.to_string()),
      _ => {}
    }
  }
  CoreError::storage(err)
}

fn push_product_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
  builder.push(" WHERE TRUE");
  if let Some(id) = query.id {
    builder.push(" AND p.id = ").push_bind(id);
  }
  if let Some(name) = &query.name {
    builder.push(" AND p.name = ").push_bind(name.clone());
  }
  if let Some(price) = query.price {
    builder.push(" AND p.price = ").push_bind(price);
  }
  if let Some(min) = query.price_min {
    builder.push(" AND p.price >= ").push_bind(min);
  }
  if let Some(max) = query.price_max {
    builder.push(" AND p.price <= ").push_bind(max);
  }
  if let Some(category) = query.category {
    builder.push(" AND p.category_id = ").push_bind(category);
  }
  if let Some(term) = query.search_term() {
    builder.push(" AND p.name ILIKE ").push_bind(format!("%{}%", escape_like(term)));
  }
}

fn escape_like(term: &str) -> String {
  let mut escaped = String::with_capacity(term.len());
  for ch in term.chars() {
    if matches!(ch, '%' | '_' | '\\') {
      escaped.push('\\');
    }
    escaped.push(ch);
  }
  escaped
}

async fn replace_product_tags(tx: &mut Transaction<'_, Postgres>, product_id: i64, tag_ids: &[i64]) -> CoreResult<()> {
  sqlx::query("INSERT INTO product_tags (product_id, tag_id) SELECT $1, UNNEST($2::BIGINT[])")
    .bind(product_id)
    .bind(tag_ids)
    .execute(&mut **tx)
    .await
    .map_err(db_error)?;
  Ok(())
}

async fn lock_order(tx: &mut Transaction<'_, Postgres>, order_id: Uuid) -> CoreResult<bool> {
  let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_error)?;
  Ok(locked.is_some())
}

async fn update_order_total(tx: &mut Transaction<'_, Postgres>, order_id: Uuid) -> CoreResult<Order> {
  let row: OrderRow = sqlx::query_as(&format!(
    "UPDATE orders SET \
       total_price = (SELECT COALESCE(SUM(op.price), 0) FROM order_products op WHERE op.order_id = $1)::NUMERIC(10, 2), \
       updated_at = now() \
     WHERE id = $1 RETURNING {}",
    ORDER_COLUMNS
  ))
  .bind(order_id)
  .fetch_one(&mut **tx)
  .await
  .map_err(db_error)?;
  Ok(row.into())
}

#[async_trait]
impl Storage for PgStorage {
  #[instrument(name = "pg::list_products", skip(self, query))]
  async fn list_products(&self, query: &ProductQuery, page: PageRequest) -> CoreResult<Page<Product>> {
    let ordering = query.ordering()?;

    let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
    push_product_filters(&mut count_query, query);
    let count: i64 = count_query
      .build_query_scalar::<i64>()
      .fetch_one(&self.pool)
      .await
      .map_err(db_error)?;

    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM products p", PRODUCT_COLUMNS));
    push_product_filters(&mut select, query);
    select
      .push(format!(
        " ORDER BY p.{} {}, p.id ASC",
        ordering.field.column(),
        if ordering.descending { "DESC" } else { "ASC" }
      ))
      .push(" LIMIT ")
      .push_bind(page.limit() as i64)
      .push(" OFFSET ")
      .push_bind(page.offset() as i64);
    let rows: Vec<ProductRow> = select.build_query_as::<ProductRow>().fetch_all(&self.pool).await.map_err(db_error)?;

    Page::new(rows.into_iter().map(Product::from).collect(), count.max(0) as u64, page)
  }

  async fn get_product(&self, id: i64) -> CoreResult<Option<Product>> {
    let row: Option<ProductRow> = sqlx::query_as(&format!("SELECT {} FROM products p WHERE p.id = $1", PRODUCT_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(row.map(Product::from))
  }

  async fn products_in_bulk(&self, ids: &[i64]) -> CoreResult<HashMap<i64, Product>> {
    if ids.is_empty() {
      return Ok(HashMap::new());
    }
    let rows: Vec<ProductRow> =
      sqlx::query_as(&format!("SELECT {} FROM products p WHERE p.id = ANY($1)", PRODUCT_COLUMNS))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
    Ok(rows.into_iter().map(|row| (row.id, Product::from(row))).collect())
  }

  #[instrument(name = "pg::insert_product", skip(self, product), fields(name = %product.name))]
  async fn insert_product(&self, product: ProductWrite) -> CoreResult<Product> {
    let mut tx = self.pool.begin().await.map_err(db_error)?;
    let id: i64 = sqlx::query_scalar(
      "INSERT INTO products (name, price, description, is_18_plus, category_id, image, thumbnail, manual) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
    )
    .bind(&product.name)
    .bind(product.price)
    .bind(&product.description)
    .bind(product.is_18_plus)
    .bind(product.category_id)
    .bind(&product.image)
    .bind(&product.thumbnail)
    .bind(&product.manual)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error)?;
    replace_product_tags(&mut tx, id, &product.tag_ids).await?;
    let created = self.product_in(&mut tx, id).await?;
    tx.commit().await.map_err(db_error)?;
    debug!(product_id = id, "Inserted product.");
    Ok(created)
  }

  #[instrument(name = "pg::update_product", skip(self, product))]
  async fn update_product(&self, id: i64, product: ProductWrite) -> CoreResult<Option<Product>> {
    let mut tx = self.pool.begin().await.map_err(db_error)?;
    let updated: Option<i64> = sqlx::query_scalar(
      "UPDATE products SET name = $1, price = $2, description = $3, is_18_plus = $4, category_id = $5, \
       image = $6, thumbnail = $7, manual = $8, updated_at = now() WHERE id = $9 RETURNING id",
    )
    .bind(&product.name)
    .bind(product.price)
    .bind(&product.description)
    .bind(product.is_18_plus)
    .bind(product.category_id)
    .bind(&product.image)
    .bind(&product.thumbnail)
    .bind(&product.manual)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_error)?;
    if updated.is_none() {
      return Ok(None);
    }
    sqlx::query("DELETE FROM product_tags WHERE product_id = $1")
      .bind(id)
      .execute(&mut *tx)
      .await
      .map_err(db_error)?;
    replace_product_tags(&mut tx, id, &product.tag_ids).await?;
    let saved = self.product_in(&mut tx, id).await?;
    tx.commit().await.map_err(db_error)?;
    Ok(Some(saved))
  }

  /// Line items of deleted products cascade away; totals of the orders that
  /// held them are recomputed in the same transaction.
  #[instrument(name = "pg::delete_products", skip(self, ids), fields(requested = ids.len()))]
  async fn delete_products(&self, ids: &[i64]) -> CoreResult<u64> {
    let mut tx = self.pool.begin().await.map_err(db_error)?;
    let affected: Vec<Uuid> = sqlx::query_scalar(
      "SELECT id FROM orders WHERE id IN \
       (SELECT order_id FROM order_products WHERE product_id = ANY($1)) ORDER BY id FOR UPDATE",
    )
    .bind(ids)
    .fetch_all(&mut *tx)
    .await
    .map_err(db_error)?;
    let deleted = sqlx::query("DELETE FROM products WHERE id = ANY($1)")
      .bind(ids)
      .execute(&mut *tx)
      .await
      .map_err(db_error)?
      .rows_affected();
    sqlx::query(
      "UPDATE orders o SET \
         total_price = (SELECT COALESCE(SUM(op.price), 0) FROM order_products op WHERE op.order_id = o.id)::NUMERIC(10, 2), \
         updated_at = now() \
       WHERE o.id = ANY($1)",
    )
    .bind(&affected)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;
    tx.commit().await.map_err(db_error)?;
    debug!(deleted, affected_orders = affected.len(), "Deleted products.");
    Ok(deleted)
  }

  async fn popular_products(&self, limit: u32) -> CoreResult<Vec<PopularProduct>> {
    let rows: Vec<PopularProductRow> = sqlx::query_as(&format!(
      "SELECT {}, COALESCE(SUM(op.quantity), 0) AS total_quantity \
       FROM products p LEFT JOIN order_products op ON op.product_id = p.id \
       GROUP BY p.id ORDER BY total_quantity DESC, p.id ASC LIMIT $1",
      PRODUCT_COLUMNS
    ))
    .bind(i64::from(limit))
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(rows.into_iter().map(PopularProduct::from).collect())
  }

  async fn list_categories(&self) -> CoreResult<Vec<Category>> {
    let rows: Vec<NamedRow> = sqlx::query_as("SELECT id, name FROM categories ORDER BY id")
      .fetch_all(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(rows.into_iter().map(Category::from).collect())
  }

  async fn insert_category(&self, name: &str) -> CoreResult<Category> {
    let row: NamedRow = sqlx::query_as("INSERT INTO categories (name) VALUES ($1) RETURNING id, name")
      .bind(name)
      .fetch_one(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(row.into())
  }

  async fn list_tags(&self) -> CoreResult<Vec<Tag>> {
    let rows: Vec<NamedRow> = sqlx::query_as("SELECT id, name FROM tags ORDER BY id")
      .fetch_all(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(rows.into_iter().map(Tag::from).collect())
  }

  async fn insert_tag(&self, name: &str) -> CoreResult<Tag> {
    let row: NamedRow = sqlx::query_as("INSERT INTO tags (name) VALUES ($1) RETURNING id, name")
      .bind(name)
      .fetch_one(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(row.into())
  }

  async fn list_orders(&self, owner: Option<i64>) -> CoreResult<Vec<Order>> {
    let rows: Vec<OrderRow> = sqlx::query_as(&format!(
      "SELECT {} FROM orders WHERE ($1::BIGINT IS NULL OR user_id = $1) ORDER BY created_at DESC, id",
      ORDER_COLUMNS
    ))
    .bind(owner)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(rows.into_iter().map(Order::from).collect())
  }

  async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
    let row: Option<OrderRow> = sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(row.map(Order::from))
  }

  async fn line_items_for_orders(&self, order_ids: &[Uuid]) -> CoreResult<Vec<LineItem>> {
    if order_ids.is_empty() {
      return Ok(Vec::new());
    }
    let rows: Vec<LineItemRow> = sqlx::query_as(&format!(
      "SELECT {} FROM order_products WHERE order_id = ANY($1) ORDER BY id",
      LINE_ITEM_COLUMNS
    ))
    .bind(order_ids)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(rows.into_iter().map(LineItem::from).collect())
  }

  /// Three statements regardless of the number of line items.
  #[instrument(name = "pg::create_order", skip(self, items), fields(items = items.len()))]
  async fn create_order(&self, user_id: i64, items: Vec<NewLineItem>) -> CoreResult<(Order, Vec<LineItem>)> {
    let order_id = Uuid::new_v4();
    let product_ids: Vec<i64> = items.iter().map(|item| item.product_id).collect();
    let quantities: Vec<Decimal> = items.iter().map(|item| item.quantity).collect();
    let prices: Vec<Decimal> = items.iter().map(|item| item.price).collect();

    let mut tx = self.pool.begin().await.map_err(db_error)?;
    sqlx::query("INSERT INTO orders (id, user_id) VALUES ($1, $2)")
      .bind(order_id)
      .bind(user_id)
      .execute(&mut *tx)
      .await
      .map_err(db_error)?;
    let rows: Vec<LineItemRow> = sqlx::query_as(&format!(
      "INSERT INTO order_products (order_id, product_id, quantity, price) \
       SELECT $1, t.product_id, t.quantity, t.price \
       FROM UNNEST($2::BIGINT[], $3::NUMERIC[], $4::NUMERIC[]) WITH ORDINALITY AS t(product_id, quantity, price, ord) \
       ORDER BY t.ord RETURNING {}",
      LINE_ITEM_COLUMNS
    ))
    .bind(order_id)
    .bind(&product_ids)
    .bind(&quantities)
    .bind(&prices)
    .fetch_all(&mut *tx)
    .await
    .map_err(db_error)?;
    let order = update_order_total(&mut tx, order_id).await?;
    tx.commit().await.map_err(db_error)?;
    Ok((order, rows.into_iter().map(LineItem::from).collect()))
  }

  /// The price is read from the product row by the insert itself, after the
  /// order lock is held. Overflowing `NUMERIC(10, 2)` surfaces as a validation error.
  async fn insert_line_item(
    &self,
    order_id: Uuid,
    product_id: i64,
    quantity: Decimal,
  ) -> CoreResult<Option<(Order, LineItem)>> {
    let mut tx = self.pool.begin().await.map_err(db_error)?;
    if !lock_order(&mut tx, order_id).await? {
      return Ok(None);
    }
    let row: Option<LineItemRow> = sqlx::query_as(&format!(
      "INSERT INTO order_products (order_id, product_id, quantity, price) \
       SELECT $1, p.id, $3, ROUND(p.price * $3, 2) FROM products p WHERE p.id = $2 \
       RETURNING {}",
      LINE_ITEM_COLUMNS
    ))
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_error)?;
    let Some(row) = row else {
      return Err(CoreError::Validation(MISSING_PRODUCTS.to_string()));
    };
    let order = update_order_total(&mut tx, order_id).await?;
    tx.commit().await.map_err(db_error)?;
    Ok(Some((order, row.into())))
  }

  async fn update_line_item(
    &self,
    order_id: Uuid,
    item_id: i64,
    quantity: Decimal,
  ) -> CoreResult<Option<(Order, LineItem)>> {
    let mut tx = self.pool.begin().await.map_err(db_error)?;
    if !lock_order(&mut tx, order_id).await? {
      return Ok(None);
    }
    let row: Option<LineItemRow> = sqlx::query_as(&format!(
      "UPDATE order_products SET quantity = $1, \
         price = ROUND((SELECT p.price FROM products p WHERE p.id = order_products.product_id) * $1, 2) \
       WHERE id = $2 AND order_id = $3 RETURNING {}",
      LINE_ITEM_COLUMNS
    ))
    .bind(quantity)
    .bind(item_id)
    .bind(order_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_error)?;
    let Some(row) = row else {
      return Ok(None);
    };
    let order = update_order_total(&mut tx, order_id).await?;
    tx.commit().await.map_err(db_error)?;
    Ok(Some((order, row.into())))
  }

  async fn delete_line_item(&self, order_id: Uuid, item_id: i64) -> CoreResult<Option<Order>> {
    let mut tx = self.pool.begin().await.map_err(db_error)?;
    if !lock_order(&mut tx, order_id).await? {
      return Ok(None);
    }
    let removed = sqlx::query("DELETE FROM order_products WHERE id = $1 AND order_id = $2")
      .bind(item_id)
      .bind(order_id)
      .execute(&mut *tx)
      .await
      .map_err(db_error)?
      .rows_affected();
    if removed == 0 {
      return Ok(None);
    }
    let order = update_order_total(&mut tx, order_id).await?;
    tx.commit().await.map_err(db_error)?;
    Ok(Some(order))
  }

  async fn delete_order(&self, id: Uuid) -> CoreResult<bool> {
    let removed = sqlx::query("DELETE FROM orders WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await
      .map_err(db_error)?
      .rows_affected();
    Ok(removed > 0)
  }

  async fn orders_report(&self) -> CoreResult<OrdersReport> {
    let (order_count, revenue_total): (i64, Decimal) =
      sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(total_price), 0)::NUMERIC(14, 2) FROM orders")
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
    Ok(OrdersReport { order_count, revenue_total, generated_at: Utc::now() })
  }

  #[instrument(name = "pg::insert_user", skip(self, user), fields(username = %user.username))]
  async fn insert_user(&self, user: NewUser) -> CoreResult<User> {
    let row: UserRow = sqlx::query_as(&format!(
      "INSERT INTO users AS u (username, email, password_hash, is_superuser) VALUES ($1, $2, $3, $4) RETURNING {}",
      USER_COLUMNS
    ))
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.is_superuser)
    .fetch_one(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(row.into())
  }

  async fn get_user(&self, id: i64) -> CoreResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {} FROM users u WHERE u.id = $1", USER_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(row.map(User::from))
  }

  async fn find_user_by_username(&self, username: &str) -> CoreResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(&format!("SELECT {} FROM users u WHERE u.username = $1", USER_COLUMNS))
      .bind(username)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(row.map(User::from))
  }

  async fn get_or_create_token(&self, user_id: i64) -> CoreResult<String> {
    // The CTE does not see its own insert, so exactly one branch yields a row.
    sqlx::query_scalar(
      "WITH inserted AS ( \
         INSERT INTO api_tokens (key, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING RETURNING key \
       ) \
       SELECT key FROM inserted UNION ALL SELECT key FROM api_tokens WHERE user_id = $2 LIMIT 1",
    )
    .bind(generate_key())
    .bind(user_id)
    .fetch_one(&self.pool)
    .await
    .map_err(db_error)
  }

  async fn user_for_token(&self, key: &str) -> CoreResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(&format!(
      "SELECT {} FROM users u JOIN api_tokens t ON t.user_id = u.id WHERE t.key = $1",
      USER_COLUMNS
    ))
    .bind(key)
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(row.map(User::from))
  }

  async fn insert_session(&self, user_id: i64, ttl: Duration) -> CoreResult<Session> {
    // Expired sessions are purged whenever a new one is issued.
    let row: SessionRow = sqlx::query_as(
      "WITH purged AS (DELETE FROM sessions WHERE expires_at <= now()) \
       INSERT INTO sessions (key, user_id, expires_at) VALUES ($1, $2, $3) RETURNING key, user_id, expires_at",
    )
    .bind(generate_key())
    .bind(user_id)
    .bind(Utc::now() + ttl)
    .fetch_one(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(row.into())
  }

  async fn user_for_session(&self, key: &str) -> CoreResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(&format!(
      "SELECT {} FROM users u JOIN sessions s ON s.user_id = u.id WHERE s.key = $1 AND s.expires_at > now()",
      USER_COLUMNS
    ))
    .bind(key)
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error)?;
    Ok(row.map(User::from))
  }

  async fn delete_session(&self, key: &str) -> CoreResult<()> {
    sqlx::query("DELETE FROM sessions WHERE key = $1")
      .bind(key)
      .execute(&self.pool)
      .await
      .map_err(db_error)?;
    Ok(())
  }
}
