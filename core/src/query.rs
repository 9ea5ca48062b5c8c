// storefront_core/src/query.rs

//! Product listing filters, ordering and page-number pagination.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::models::Product;

/// Filters accepted by the product listing. All present filters must match.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductQuery {
  pub id: Option<i64>,
  pub name: Option<String>,
  pub price: Option<Decimal>,
  pub price_min: Option<Decimal>,
  pub price_max: Option<Decimal>,
  pub category: Option<i64>,
  /// Case-insensitive substring match over the name.
  pub search: Option<String>,
  /// `name`, `price` or `id`, optionally prefixed with `-` for descending.
  pub ordering: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductField {
  Id,
  Name,
  Price,
}

impl ProductField {
  pub fn column(self) -> &'static str {
    match self {
      ProductField::Id => "id",
      ProductField::Name => "name",
      ProductField::Price => "price",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductOrdering {
  pub field: ProductField,
  pub descending: bool,
}

impl Default for ProductOrdering {
  fn default() -> Self {
    Self { field: ProductField::Id, descending: false }
  }
}

impl ProductOrdering {
  pub fn parse(raw: &str) -> CoreResult<Self> {
    let raw = raw.trim();
    let (descending, name) = match raw.strip_prefix('-') {
      Some(rest) => (true, rest),
      None => (false, raw),
    };
    let field = match name {
      "id" => ProductField::Id,
      "name" => ProductField::Name,
      "price" => ProductField::Price,
      other => {
        return Err(CoreError::Validation(format!(
          "Cannot order by '{}'. Allowed fields: id, name, price.",
          other
        )))
      }
    };
    Ok(Self { field, descending })
  }
}

impl ProductQuery {
  pub fn ordering(&self) -> CoreResult<ProductOrdering> {
    match self.ordering.as_deref() {
      None | Some("") => Ok(ProductOrdering::default()),
      Some(raw) => ProductOrdering::parse(raw),
    }
  }

  /// The search term, trimmed, if it has any content.
  pub fn search_term(&self) -> Option<&str> {
    self.search.as_deref().map(str::trim).filter(|term| !term.is_empty())
  }

  pub fn matches(&self, product: &Product) -> bool {
    if self.id.is_some_and(|id| id != product.id) {
      return false;
    }
    if self.name.as_deref().is_some_and(|name| name != product.name) {
      return false;
    }
    if self.price.is_some_and(|price| price != product.price) {
      return false;
    }
    if self.price_min.is_some_and(|min| product.price < min) {
      return false;
    }
    if self.price_max.is_some_and(|max| product.price > max) {
      return false;
    }
    if self.category.is_some() && self.category != product.category_id {
      return false;
    }
    if let Some(term) = self.search_term() {
      if !product.name.to_lowercase().contains(&term.to_lowercase()) {
        return false;
      }
    }
    true
  }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub page: u32,
  pub page_size: u32,
}

impl PageRequest {
  pub fn new(page: Option<u32>, page_size: u32) -> CoreResult<Self> {
    let page = page.unwrap_or(1);
    if page == 0 {
      return Err(CoreError::Validation("Page numbers start at 1.".to_string()));
    }
    Ok(Self { page, page_size: page_size.max(1) })
  }

  pub fn offset(&self) -> u64 {
    u64::from(self.page - 1) * u64::from(self.page_size)
  }

  pub fn limit(&self) -> u64 {
    u64::from(self.page_size)
  }
}

/// Pagination envelope: total count, neighbouring page numbers and one page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
  pub count: u64,
  pub next: Option<u32>,
  pub previous: Option<u32>,
  pub results: Vec<T>,
}

impl<T> Page<T> {
  /// Builds the envelope, rejecting pages past the end (except an empty first page).
  pub fn new(results: Vec<T>, count: u64, request: PageRequest) -> CoreResult<Self> {
    if request.page > 1 && request.offset() >= count {
      return Err(CoreError::NotFound("Invalid page.".to_string()));
    }
    let next = (request.offset() + request.limit() < count).then(|| request.page + 1);
    let previous = (request.page > 1).then(|| request.page - 1);
    Ok(Self { count, next, previous, results })
  }

  pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
    Page {
      count: self.count,
      next: self.next,
      previous: self.previous,
      results: self.results.into_iter().map(f).collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ordering_accepts_known_fields_with_direction() {
    let ordering = ProductOrdering::parse("-price").unwrap();
    assert_eq!(ordering.field, ProductField::Price);
    assert!(ordering.descending);
    assert_eq!(ProductQuery::default().ordering().unwrap(), ProductOrdering::default());
    assert!(ProductOrdering::parse("description").is_err());
  }

  #[test]
  fn page_envelope_links_neighbours() {
    let request = PageRequest::new(Some(2), 10).unwrap();
    let page = Page::new(vec![(); 10], 25, request).unwrap();
    assert_eq!(page.next, Some(3));
    assert_eq!(page.previous, Some(1));

    let last = Page::new(vec![(); 5], 25, PageRequest::new(Some(3), 10).unwrap()).unwrap();
    assert_eq!(last.next, None);
  }

  #[test]
  fn pages_past_the_end_are_rejected() {
    assert!(Page::<()>::new(vec![], 0, PageRequest::new(Some(1), 10).unwrap()).is_ok());
    assert!(Page::<()>::new(vec![], 10, PageRequest::new(Some(2), 10).unwrap()).is_err());
    assert!(PageRequest::new(Some(0), 10).is_err());
  }
}
