// storefront_core/src/storage/memory.rs

//! In-memory storage for development and tests.
//!
//! All state sits behind one lock, so each method is atomic. Every method
//! records the statements a relational backend would issue for it, which lets
//! tests assert on query counts.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use super::Storage;
use crate::error::{CoreError, CoreResult};
use crate::models::{
  generate_key, Category, LineItem, NewLineItem, NewUser, Order, OrdersReport, PopularProduct, Product, ProductWrite,
  Session, Tag, User,
};
use crate::pricing;
use crate::services::orders::MISSING_PRODUCTS;
use crate::query::{Page, PageRequest, ProductField, ProductQuery};

const THUMBNAIL_TAKEN: &str = "Another product already uses this thumbnail.";

#[derive(Default)]
struct State {
  product_seq: i64,
  category_seq: i64,
  tag_seq: i64,
  line_item_seq: i64,
  user_seq: i64,
  products: BTreeMap<i64, Product>,
  categories: BTreeMap<i64, Category>,
  tags: BTreeMap<i64, Tag>,
  /// Insertion order; newest last.
  orders: Vec<Order>,
  line_items: BTreeMap<i64, LineItem>,
  users: BTreeMap<i64, User>,
  tokens: HashMap<String, i64>,
  sessions: HashMap<String, Session>,
}

impl State {
  fn order_mut(&mut self, id: Uuid) -> Option<&mut Order> {
    self.orders.iter_mut().find(|order| order.id == id)
  }

  fn check_product(&self, id: Option<i64>, write: &ProductWrite) -> CoreResult<()> {
    if self.products.values().any(|p| p.name == write.name && Some(p.id) != id) {
      return Err(CoreError::Conflict("Product with this name already exists.".to_string()));
    }
    if let Some(thumbnail) = &write.thumbnail {
      if self.products.values().any(|p| p.thumbnail.as_ref() == Some(thumbnail) && Some(p.id) != id) {
        return Err(CoreError::Conflict(THUMBNAIL_TAKEN.to_string()));
      }
    }
    if let Some(category_id) = write.category_id {
      if !self.categories.contains_key(&category_id) {
        return Err(CoreError::Validation(format!("Category {} does not exist.", category_id)));
      }
    }
    if let Some(missing) = write.tag_ids.iter().find(|tag_id| !self.tags.contains_key(tag_id)) {
      return Err(CoreError::Validation(format!("Tag {} does not exist.", missing)));
    }
    Ok(())
  }

  /// Persists `sum(line item prices)` on the order and returns the updated row.
  fn recompute_total(&mut self, order_id: Uuid) -> Option<Order> {
    let total = pricing::order_total(
      self
        .line_items
        .values()
        .filter(|item| item.order_id == order_id)
        .map(|item| item.price),
    );
    let order = self.order_mut(order_id)?;
    order.total_price = Some(total);
    order.updated_at = Utc::now();
    Some(order.clone())
  }

  /// Refuses a line-item write that would leave the order total too wide to store.
  fn check_total_with(&self, order_id: Uuid, replaced: Option<i64>, price: Decimal) -> CoreResult<()> {
    let others = self
      .line_items
      .values()
      .filter(|item| item.order_id == order_id && Some(item.id) != replaced)
      .map(|item| item.price);
    pricing::checked_order_total(others.chain(std::iter::once(price))).map(|_| ())
  }

  fn insert_line_item(&mut self, order_id: Uuid, item: NewLineItem) -> LineItem {
    self.line_item_seq += 1;
    let line_item = LineItem {
      id: self.line_item_seq,
      order_id,
      product_id: item.product_id,
      quantity: item.quantity,
      price: item.price,
    };
    self.line_items.insert(line_item.id, line_item.clone());
    line_item
  }
}

#[derive(Default)]
pub struct MemoryStorage {
  state: Mutex<State>,
  executed: Mutex<Vec<&'static str>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Statements issued so far, in order.
  pub fn executed(&self) -> Vec<&'static str> {
    self.executed.lock().clone()
  }

  pub fn reset_executed(&self) {
    self.executed.lock().clear();
  }

  fn record(&self, statements: &[&'static str]) {
    self.executed.lock().extend_from_slice(statements);
  }
}

#[async_trait]
impl Storage for MemoryStorage {
  async fn list_products(&self, query: &ProductQuery, page: PageRequest) -> CoreResult<Page<Product>> {
    let ordering = query.ordering()?;
    self.record(&["count_products", "select_products"]);
    let state = self.state.lock();
    let mut matching: Vec<&Product> = state.products.values().filter(|p| query.matches(p)).collect();
    matching.sort_by(|a, b| {
      let primary = match ordering.field {
        ProductField::Id => a.id.cmp(&b.id),
        ProductField::Name => a.name.cmp(&b.name),
        ProductField::Price => a.price.cmp(&b.price),
      };
      let primary = if ordering.descending { primary.reverse() } else { primary };
      primary.then(a.id.cmp(&b.id))
    });
    let count = matching.len() as u64;
    let results = matching
      .into_iter()
      .skip(page.offset() as usize)
      .take(page.limit() as usize)
      .cloned()
      .collect();
    Page::new(results, count, page)
  }

  async fn get_product(&self, id: i64) -> CoreResult<Option<Product>> {
    self.record(&["select_product"]);
    Ok(self.state.lock().products.get(&id).cloned())
  }

  async fn products_in_bulk(&self, ids: &[i64]) -> CoreResult<HashMap<i64, Product>> {
    self.record(&["select_products_in_bulk"]);
    let state = self.state.lock();
    Ok(
      ids
        .iter()
        .filter_map(|id| state.products.get(id).map(|p| (*id, p.clone())))
        .collect(),
    )
  }

  async fn insert_product(&self, product: ProductWrite) -> CoreResult<Product> {
    self.record(&["insert_product", "insert_product_tags"]);
    let mut state = self.state.lock();
    state.check_product(None, &product)?;
    state.product_seq += 1;
    let now = Utc::now();
    let created = Product {
      id: state.product_seq,
      name: product.name,
      price: product.price,
      description: product.description,
      is_18_plus: product.is_18_plus,
      category_id: product.category_id,
      tag_ids: product.tag_ids,
      image: product.image,
      thumbnail: product.thumbnail,
      manual: product.manual,
      created_at: now,
      updated_at: now,
    };
    state.products.insert(created.id, created.clone());
    debug!(product_id = created.id, "Inserted product into memory storage.");
    Ok(created)
  }

  async fn update_product(&self, id: i64, product: ProductWrite) -> CoreResult<Option<Product>> {
    self.record(&["update_product", "delete_product_tags", "insert_product_tags"]);
    let mut state = self.state.lock();
    if !state.products.contains_key(&id) {
      return Ok(None);
    }
    state.check_product(Some(id), &product)?;
    let Some(existing) = state.products.get_mut(&id) else {
      return Ok(None);
    };
    existing.name = product.name;
    existing.price = product.price;
    existing.description = product.description;
    existing.is_18_plus = product.is_18_plus;
    existing.category_id = product.category_id;
    existing.tag_ids = product.tag_ids;
    existing.image = product.image;
    existing.thumbnail = product.thumbnail;
    existing.manual = product.manual;
    existing.updated_at = Utc::now();
    Ok(Some(existing.clone()))
  }

  async fn delete_products(&self, ids: &[i64]) -> CoreResult<u64> {
    self.record(&["lock_affected_orders", "delete_products", "update_order_totals"]);
    let mut state = self.state.lock();
    let doomed: HashSet<i64> = ids.iter().copied().filter(|id| state.products.contains_key(id)).collect();
    let affected_orders: HashSet<Uuid> = state
      .line_items
      .values()
      .filter(|item| doomed.contains(&item.product_id))
      .map(|item| item.order_id)
      .collect();
    state.products.retain(|id, _| !doomed.contains(id));
    state.line_items.retain(|_, item| !doomed.contains(&item.product_id));
    for order_id in affected_orders {
      state.recompute_total(order_id);
    }
    Ok(doomed.len() as u64)
  }

  async fn popular_products(&self, limit: u32) -> CoreResult<Vec<PopularProduct>> {
    self.record(&["select_popular_products"]);
    let state = self.state.lock();
    let mut totals: HashMap<i64, Decimal> = HashMap::new();
    for item in state.line_items.values() {
      *totals.entry(item.product_id).or_insert(Decimal::ZERO) += item.quantity;
    }
    let mut ranked: Vec<PopularProduct> = state
      .products
      .values()
      .map(|product| PopularProduct {
        product: product.clone(),
        total_quantity: totals.get(&product.id).copied().unwrap_or(Decimal::ZERO),
      })
      .collect();
    ranked.sort_by(|a, b| {
      b.total_quantity
        .cmp(&a.total_quantity)
        .then(a.product.id.cmp(&b.product.id))
    });
    ranked.truncate(limit as usize);
    Ok(ranked)
  }

  async fn list_categories(&self) -> CoreResult<Vec<Category>> {
    self.record(&["select_categories"]);
    Ok(self.state.lock().categories.values().cloned().collect())
  }

  async fn insert_category(&self, name: &str) -> CoreResult<Category> {
    self.record(&["insert_category"]);
    let mut state = self.state.lock();
    state.category_seq += 1;
    let category = Category { id: state.category_seq, name: name.to_string() };
    state.categories.insert(category.id, category.clone());
    Ok(category)
  }

  async fn list_tags(&self) -> CoreResult<Vec<Tag>> {
    self.record(&["select_tags"]);
    Ok(self.state.lock().tags.values().cloned().collect())
  }

  async fn insert_tag(&self, name: &str) -> CoreResult<Tag> {
    self.record(&["insert_tag"]);
    let mut state = self.state.lock();
    state.tag_seq += 1;
    let tag = Tag { id: state.tag_seq, name: name.to_string() };
    state.tags.insert(tag.id, tag.clone());
    Ok(tag)
  }

  async fn list_orders(&self, owner: Option<i64>) -> CoreResult<Vec<Order>> {
    self.record(&["select_orders"]);
    let state = self.state.lock();
    Ok(
      state
        .orders
        .iter()
        .rev()
        .filter(|order| owner.map_or(true, |user_id| order.user_id == user_id))
        .cloned()
        .collect(),
    )
  }

  async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
    self.record(&["select_order"]);
    Ok(self.state.lock().orders.iter().find(|order| order.id == id).cloned())
  }

  async fn line_items_for_orders(&self, order_ids: &[Uuid]) -> CoreResult<Vec<LineItem>> {
    self.record(&["select_line_items"]);
    let wanted: HashSet<&Uuid> = order_ids.iter().collect();
    Ok(
      self
        .state
        .lock()
        .line_items
        .values()
        .filter(|item| wanted.contains(&item.order_id))
        .cloned()
        .collect(),
    )
  }

  async fn create_order(&self, user_id: i64, items: Vec<NewLineItem>) -> CoreResult<(Order, Vec<LineItem>)> {
    self.record(&["insert_order", "insert_line_items", "update_order_total"]);
    let mut state = self.state.lock();
    if !state.users.contains_key(&user_id) {
      return Err(CoreError::Validation(format!("User {} does not exist.", user_id)));
    }
    if let Some(missing) = items.iter().find(|item| !state.products.contains_key(&item.product_id)) {
      return Err(CoreError::Validation(format!("Product {} does not exist.", missing.product_id)));
    }
    let now = Utc::now();
    let order = Order {
      id: Uuid::new_v4(),
      user_id,
      total_price: None,
      created_at: now,
      updated_at: now,
    };
    let order_id = order.id;
    state.orders.push(order);
    let line_items: Vec<LineItem> = items
      .into_iter()
      .map(|item| state.insert_line_item(order_id, item))
      .collect();
    let order = state
      .recompute_total(order_id)
      .ok_or_else(|| CoreError::Internal("Order vanished during creation.".to_string()))?;
    Ok((order, line_items))
  }

  async fn insert_line_item(
    &self,
    order_id: Uuid,
    product_id: i64,
    quantity: Decimal,
  ) -> CoreResult<Option<(Order, LineItem)>> {
    self.record(&["lock_order", "insert_line_item", "update_order_total"]);
    let mut state = self.state.lock();
    if state.order_mut(order_id).is_none() {
      return Ok(None);
    }
    let unit_price = state
      .products
      .get(&product_id)
      .map(|product| product.price)
      .ok_or_else(|| CoreError::Validation(MISSING_PRODUCTS.to_string()))?;
    let price = pricing::checked_line_price(unit_price, quantity)?;
    state.check_total_with(order_id, None, price)?;
    let line_item = state.insert_line_item(order_id, NewLineItem { product_id, quantity, price });
    Ok(state.recompute_total(order_id).map(|order| (order, line_item)))
  }

  async fn update_line_item(
    &self,
    order_id: Uuid,
    item_id: i64,
    quantity: Decimal,
  ) -> CoreResult<Option<(Order, LineItem)>> {
    self.record(&["lock_order", "update_line_item", "update_order_total"]);
    let mut state = self.state.lock();
    let product_id = match state.line_items.get(&item_id) {
      Some(item) if item.order_id == order_id => item.product_id,
      _ => return Ok(None),
    };
    let Some(unit_price) = state.products.get(&product_id).map(|product| product.price) else {
      return Ok(None);
    };
    let price = pricing::checked_line_price(unit_price, quantity)?;
    state.check_total_with(order_id, Some(item_id), price)?;
    let Some(item) = state.line_items.get_mut(&item_id) else {
      return Ok(None);
    };
    item.quantity = quantity;
    item.price = price;
    let updated = item.clone();
    Ok(state.recompute_total(order_id).map(|order| (order, updated)))
  }

  async fn delete_line_item(&self, order_id: Uuid, item_id: i64) -> CoreResult<Option<Order>> {
    self.record(&["lock_order", "delete_line_item", "update_order_total"]);
    let mut state = self.state.lock();
    match state.line_items.get(&item_id) {
      Some(item) if item.order_id == order_id => {
        state.line_items.remove(&item_id);
      }
      _ => return Ok(None),
    }
    Ok(state.recompute_total(order_id))
  }

  async fn delete_order(&self, id: Uuid) -> CoreResult<bool> {
    self.record(&["delete_order"]);
    let mut state = self.state.lock();
    let before = state.orders.len();
    state.orders.retain(|order| order.id != id);
    let deleted = state.orders.len() != before;
    if deleted {
      state.line_items.retain(|_, item| item.order_id != id);
    }
    Ok(deleted)
  }

  async fn orders_report(&self) -> CoreResult<OrdersReport> {
    self.record(&["select_orders_report"]);
    let state = self.state.lock();
    Ok(OrdersReport {
      order_count: state.orders.len() as i64,
      revenue_total: pricing::order_total(state.orders.iter().filter_map(|order| order.total_price)),
      generated_at: Utc::now(),
    })
  }

  async fn insert_user(&self, user: NewUser) -> CoreResult<User> {
    self.record(&["insert_user"]);
    let mut state = self.state.lock();
    if state.users.values().any(|u| u.username == user.username) {
      return Err(CoreError::Conflict("A user with that username already exists.".to_string()));
    }
    state.user_seq += 1;
    let created = User {
      id: state.user_seq,
      username: user.username,
      email: user.email,
      password_hash: user.password_hash,
      is_superuser: user.is_superuser,
      created_at: Utc::now(),
    };
    state.users.insert(created.id, created.clone());
    Ok(created)
  }

  async fn get_user(&self, id: i64) -> CoreResult<Option<User>> {
    self.record(&["select_user"]);
    Ok(self.state.lock().users.get(&id).cloned())
  }

  async fn find_user_by_username(&self, username: &str) -> CoreResult<Option<User>> {
    self.record(&["select_user"]);
    Ok(self.state.lock().users.values().find(|u| u.username == username).cloned())
  }

  async fn get_or_create_token(&self, user_id: i64) -> CoreResult<String> {
    self.record(&["upsert_token"]);
    let mut state = self.state.lock();
    if let Some((key, _)) = state.tokens.iter().find(|(_, owner)| **owner == user_id) {
      return Ok(key.clone());
    }
    let key = generate_key();
    state.tokens.insert(key.clone(), user_id);
    Ok(key)
  }

  async fn user_for_token(&self, key: &str) -> CoreResult<Option<User>> {
    self.record(&["select_token_user"]);
    let state = self.state.lock();
    Ok(state.tokens.get(key).and_then(|user_id| state.users.get(user_id)).cloned())
  }

  async fn insert_session(&self, user_id: i64, ttl: Duration) -> CoreResult<Session> {
    self.record(&["delete_expired_sessions", "insert_session"]);
    let now = Utc::now();
    let session = Session { key: generate_key(), user_id, expires_at: now + ttl };
    let mut state = self.state.lock();
    state.sessions.retain(|_, existing| existing.expires_at > now);
    state.sessions.insert(session.key.clone(), session.clone());
    Ok(session)
  }

  async fn user_for_session(&self, key: &str) -> CoreResult<Option<User>> {
    self.record(&["select_session_user"]);
    let state = self.state.lock();
    Ok(
      state
        .sessions
        .get(key)
        .filter(|session| session.expires_at > Utc::now())
        .and_then(|session| state.users.get(&session.user_id))
        .cloned(),
    )
  }

  async fn delete_session(&self, key: &str) -> CoreResult<()> {
    self.record(&["delete_session"]);
    self.state.lock().sessions.remove(key);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn seed_user(storage: &MemoryStorage) -> User {
    storage
      .insert_user(NewUser {
        username: "ada".to_string(),
        email: "ada@example.com".to_string(),
        password_hash: "hash".to_string(),
        is_superuser: false,
      })
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn new_sessions_purge_expired_ones() {
    let storage = MemoryStorage::new();
    let user = seed_user(&storage).await;

    let stale = storage.insert_session(user.id, Duration::seconds(-1)).await.unwrap();
    let live = storage.insert_session(user.id, Duration::hours(1)).await.unwrap();
    storage.insert_session(user.id, Duration::hours(1)).await.unwrap();

    let state = storage.state.lock();
    let sessions = &state.sessions;
    assert_eq!(sessions.len(), 2);
    assert!(!sessions.contains_key(&stale.key));
    assert!(sessions.contains_key(&live.key));
  }

  #[tokio::test]
  async fn line_item_prices_are_read_under_the_write() {
    let storage = MemoryStorage::new();
    let user = seed_user(&storage).await;
    let product = storage
      .insert_product(ProductWrite {
        name: "Lamp".to_string(),
        price: "10.00".parse().unwrap(),
        description: None,
        is_18_plus: false,
        category_id: None,
        tag_ids: Vec::new(),
        image: None,
        thumbnail: None,
        manual: None,
      })
      .await
      .unwrap();
    let (order, _) = storage.create_order(user.id, Vec::new()).await.unwrap();

    let (_, item) = storage
      .insert_line_item(order.id, product.id, "1.5".parse().unwrap())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(item.price, "15.00".parse::<Decimal>().unwrap());

    storage.state.lock().products.get_mut(&product.id).unwrap().price = "12.00".parse().unwrap();
    let (order, item) = storage
      .update_line_item(order.id, item.id, "2".parse().unwrap())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(item.price, "24.00".parse::<Decimal>().unwrap());
    assert_eq!(order.total_price, Some("24.00".parse().unwrap()));

    let missing = storage.insert_line_item(order.id, 999, Decimal::ONE).await;
    assert!(matches!(missing, Err(CoreError::Validation(ref message)) if message == MISSING_PRODUCTS));
  }
}
