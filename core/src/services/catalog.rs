// storefront_core/src/services/catalog.rs

use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::{ServiceSettings, POPULAR_LIMIT};
use crate::cache::{self, keys, Cache};
use crate::error::{CoreError, CoreResult};
use crate::media::{MediaRoot, StagedThumbnail};
use crate::models::{Category, PopularProduct, Product, ProductInput, ProductPatch, ProductWrite, Tag};
use crate::pricing;
use crate::query::{Page, PageRequest, ProductQuery};
use crate::storage::Storage;

const MAX_NAME_LEN: usize = 255;

#[derive(Clone)]
pub struct CatalogService {
  storage: Arc<dyn Storage>,
  cache: Arc<dyn Cache>,
  media: MediaRoot,
  settings: ServiceSettings,
}

impl CatalogService {
  pub fn new(storage: Arc<dyn Storage>, cache: Arc<dyn Cache>, media: MediaRoot, settings: ServiceSettings) -> Self {
    Self { storage, cache, media, settings }
  }

  #[instrument(name = "catalog::list_products", skip(self))]
  pub async fn list_products(&self, query: &ProductQuery, page: Option<u32>) -> CoreResult<Page<Product>> {
    let request = PageRequest::new(page, self.settings.page_size)?;
    self.storage.list_products(query, request).await
  }

  pub async fn get_product(&self, id: i64) -> CoreResult<Product> {
    self
      .storage
      .get_product(id)
      .await?
      .ok_or_else(|| CoreError::NotFound(format!("Product {} not found.", id)))
  }

  #[instrument(name = "catalog::create_product", skip(self, input), fields(name = %input.name))]
  pub async fn create_product(&self, input: ProductInput) -> CoreResult<Product> {
    validate_product(&input)?;
    let staged = match input.image.as_deref() {
      Some(image) => Some(self.media.derive_thumbnail(image, input.name.trim()).await?),
      None => None,
    };
    let thumbnail = staged.as_ref().map(|t| t.path().to_string());
    let written = self.storage.insert_product(ProductWrite::from_input(input, thumbnail)).await;
    let product = settle_thumbnail(staged, written).await?;
    info!(product_id = product.id, "Product created.");
    self.invalidate_product_views().await;
    Ok(product)
  }

  /// Full replacement (PUT semantics).
  #[instrument(name = "catalog::replace_product", skip(self, input))]
  pub async fn replace_product(&self, id: i64, input: ProductInput) -> CoreResult<Product> {
    let current = self.get_product(id).await?;
    self.write_product(current, input).await
  }

  /// Partial update (PATCH semantics).
  #[instrument(name = "catalog::patch_product", skip(self, patch))]
  pub async fn patch_product(&self, id: i64, patch: ProductPatch) -> CoreResult<Product> {
    let current = self.get_product(id).await?;
    let input = patch.apply_to(&current);
    self.write_product(current, input).await
  }

  async fn write_product(&self, current: Product, input: ProductInput) -> CoreResult<Product> {
    validate_product(&input)?;
    // Only a changed image reference re-derives the thumbnail.
    let (staged, thumbnail) = if input.image == current.image {
      (None, current.thumbnail.clone())
    } else {
      match input.image.as_deref() {
        Some(image) => {
          let staged = self.media.derive_thumbnail(image, input.name.trim()).await?;
          let path = staged.path().to_string();
          (Some(staged), Some(path))
        }
        None => (None, None),
      }
    };
    let written = self
      .storage
      .update_product(current.id, ProductWrite::from_input(input, thumbnail))
      .await
      .and_then(|updated| updated.ok_or_else(|| CoreError::NotFound(format!("Product {} not found.", current.id))));
    let product = settle_thumbnail(staged, written).await?;
    info!(product_id = product.id, "Product updated.");
    self.invalidate_product_views().await;
    Ok(product)
  }

  #[instrument(name = "catalog::delete_product", skip(self))]
  pub async fn delete_product(&self, id: i64) -> CoreResult<()> {
    if self.storage.delete_products(&[id]).await? == 0 {
      return Err(CoreError::NotFound(format!("Product {} not found.", id)));
    }
    info!(product_id = id, "Product deleted.");
    self.invalidate_product_views().await;
    Ok(())
  }

  /// Bulk deletion; unknown ids are ignored.
  #[instrument(name = "catalog::delete_products", skip(self, ids), fields(requested = ids.len()))]
  pub async fn delete_products(&self, ids: &[i64]) -> CoreResult<u64> {
    if ids.is_empty() {
      return Ok(0);
    }
    let deleted = self.storage.delete_products(ids).await?;
    info!(deleted, "Products deleted in bulk.");
    if deleted > 0 {
      self.invalidate_product_views().await;
    }
    Ok(deleted)
  }

  /// Top products by cumulative ordered quantity, served from cache when possible.
  #[instrument(name = "catalog::popular_products", skip(self))]
  pub async fn popular_products(&self) -> CoreResult<Vec<PopularProduct>> {
    if let Some(cached) = cache::get_json::<Vec<PopularProduct>>(self.cache.as_ref(), keys::POPULAR_PRODUCTS).await {
      return Ok(cached);
    }
    let ranked = self.storage.popular_products(POPULAR_LIMIT).await?;
    cache::set_json(
      self.cache.as_ref(),
      keys::POPULAR_PRODUCTS,
      &ranked,
      Some(self.settings.cache_ttl),
    )
    .await;
    Ok(ranked)
  }

  pub async fn list_categories(&self) -> CoreResult<Vec<Category>> {
    self.storage.list_categories().await
  }

  pub async fn create_category(&self, name: &str) -> CoreResult<Category> {
    self.storage.insert_category(validate_name("Category name", name)?).await
  }

  pub async fn list_tags(&self) -> CoreResult<Vec<Tag>> {
    self.storage.list_tags().await
  }

  pub async fn create_tag(&self, name: &str) -> CoreResult<Tag> {
    self.storage.insert_tag(validate_name("Tag name", name)?).await
  }

  /// Product data is embedded in the popular ranking and in cached order lists.
  async fn invalidate_product_views(&self) {
    cache::invalidate(self.cache.as_ref(), keys::POPULAR_PRODUCTS).await;
    cache::invalidate_prefix(self.cache.as_ref(), keys::ORDERS_PREFIX).await;
  }
}

/// A staged thumbnail replaces the file on disk only once the row that
/// references it is stored. Storage rejects a thumbnail path that another
/// product already owns.
async fn settle_thumbnail(staged: Option<StagedThumbnail>, written: CoreResult<Product>) -> CoreResult<Product> {
  match (staged, written) {
    (Some(staged), Ok(product)) => {
      staged.commit().await?;
      Ok(product)
    }
    (Some(staged), Err(err)) => {
      warn!(thumbnail = staged.path(), error = %err, "Product write failed; dropping the staged thumbnail.");
      staged.discard().await;
      Err(err)
    }
    (None, written) => written,
  }
}

fn validate_product(input: &ProductInput) -> CoreResult<()> {
  validate_name("Name", &input.name)?;
  pricing::validate_price(input.price)
}

fn validate_name<'a>(label: &str, name: &'a str) -> CoreResult<&'a str> {
  let trimmed = name.trim();
  if trimmed.is_empty() {
    return Err(CoreError::Validation(format!("{} may not be blank.", label)));
  }
  if trimmed.chars().count() > MAX_NAME_LEN {
    return Err(CoreError::Validation(format!(
      "{} must have no more than {} characters.",
      label, MAX_NAME_LEN
    )));
  }
  Ok(trimmed)
}
