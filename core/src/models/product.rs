// storefront_core/src/models/product.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
  pub id: i64,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
  pub id: i64,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
  pub id: i64,
  pub name: String,
  pub price: Decimal,
  pub description: Option<String>,
  pub is_18_plus: bool,
  pub category_id: Option<i64>,
  /// Sorted, without duplicates.
  pub tag_ids: Vec<i64>,
  /// Paths relative to the media root.
  pub image: Option<String>,
  pub thumbnail: Option<String>,
  pub manual: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A product annotated with the cumulative quantity ordered across all orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularProduct {
  #[serde(flatten)]
  pub product: Product,
  pub total_quantity: Decimal,
}

/// Full product payload, used for creation and full replacement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductInput {
  pub name: String,
  pub price: Decimal,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub is_18_plus: bool,
  #[serde(default)]
  pub category_id: Option<i64>,
  #[serde(default)]
  pub tag_ids: Vec<i64>,
  #[serde(default)]
  pub image: Option<String>,
  #[serde(default)]
  pub manual: Option<String>,
}

/// Partial product payload. Nullable fields distinguish "absent" (`None`)
/// from "set to null" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductPatch {
  pub name: Option<String>,
  pub price: Option<Decimal>,
  #[serde(default, deserialize_with = "present")]
  pub description: Option<Option<String>>,
  pub is_18_plus: Option<bool>,
  #[serde(default, deserialize_with = "present")]
  pub category_id: Option<Option<i64>>,
  pub tag_ids: Option<Vec<i64>>,
  #[serde(default, deserialize_with = "present")]
  pub image: Option<Option<String>>,
  #[serde(default, deserialize_with = "present")]
  pub manual: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(deserializer).map(Some)
}

impl ProductPatch {
  /// Merges the patch over the current state of a product.
  pub fn apply_to(self, current: &Product) -> ProductInput {
    ProductInput {
      name: self.name.unwrap_or_else(|| current.name.clone()),
      price: self.price.unwrap_or(current.price),
      description: self.description.unwrap_or_else(|| current.description.clone()),
      is_18_plus: self.is_18_plus.unwrap_or(current.is_18_plus),
      category_id: self.category_id.unwrap_or(current.category_id),
      tag_ids: self.tag_ids.unwrap_or_else(|| current.tag_ids.clone()),
      image: self.image.unwrap_or_else(|| current.image.clone()),
      manual: self.manual.unwrap_or_else(|| current.manual.clone()),
    }
  }
}

/// What a storage backend persists for a product write. The thumbnail is
/// already derived by the time this is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductWrite {
  pub name: String,
  pub price: Decimal,
  pub description: Option<String>,
  pub is_18_plus: bool,
  pub category_id: Option<i64>,
  pub tag_ids: Vec<i64>,
  pub image: Option<String>,
  pub thumbnail: Option<String>,
  pub manual: Option<String>,
}

impl ProductWrite {
  pub fn from_input(input: ProductInput, thumbnail: Option<String>) -> Self {
    let mut tag_ids = input.tag_ids;
    tag_ids.sort_unstable();
    tag_ids.dedup();
    Self {
      name: input.name.trim().to_string(),
      price: input.price,
      description: input.description,
      is_18_plus: input.is_18_plus,
      category_id: input.category_id,
      tag_ids,
      image: input.image,
      thumbnail,
      manual: input.manual,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn patch_distinguishes_absent_from_null() {
    let patch: ProductPatch = serde_json::from_str(r#"{"description": null, "price": "3.50"}"#).unwrap();
    assert_eq!(patch.description, Some(None));
    assert_eq!(patch.image, None);
    assert_eq!(patch.price, Some(Decimal::new(350, 2)));
  }

  #[test]
  fn write_sorts_and_dedups_tags() {
    let input = ProductInput {
      name: "  Lamp ".into(),
      price: Decimal::new(1000, 2),
      description: None,
      is_18_plus: false,
      category_id: None,
      tag_ids: vec![3, 1, 3, 2],
      image: None,
      manual: None,
    };
    let write = ProductWrite::from_input(input, None);
    assert_eq!(write.name, "Lamp");
    assert_eq!(write.tag_ids, vec![1, 2, 3]);
  }
}
