// storefront_server/src/graphql/query.rs

use async_graphql::{Context, FieldResult, Object, ID};
use storefront_core::models::{OrderPrefetch, Viewer};
use storefront_core::{CoreError, ProductQuery};

use super::schema::{to_graphql_error, GraphQLContext};
use super::types::{Order, PopularProductEntry, Product, ProductFilter, ProductPage};

/// Root query object for GraphQL
pub struct Query;

#[Object]
impl Query {
  async fn hello(&self) -> &'static str {
    "Hi!"
  }

  /// Filtered, paginated product listing
  async fn products(
    &self,
    ctx: &Context<'_>,
    filter: Option<ProductFilter>,
    page: Option<u32>,
  ) -> FieldResult<ProductPage> {
    let context = ctx.data::<GraphQLContext>()?;
    let query: ProductQuery = filter.unwrap_or_default().into();
    let page = context.catalog.list_products(&query, page).await.map_err(to_graphql_error)?;
    Ok(page.into())
  }

  async fn product(&self, ctx: &Context<'_>, id: ID) -> FieldResult<Option<Product>> {
    let context = ctx.data::<GraphQLContext>()?;
    let id = parse_id(&id)?;
    match context.catalog.get_product(id).await {
      Ok(product) => Ok(Some(product.into())),
      Err(CoreError::NotFound(_)) => Ok(None),
      Err(e) => Err(to_graphql_error(e)),
    }
  }

  async fn popular_products(&self, ctx: &Context<'_>) -> FieldResult<Vec<PopularProductEntry>> {
    let context = ctx.data::<GraphQLContext>()?;
    let ranked = context.catalog.popular_products().await.map_err(to_graphql_error)?;
    Ok(ranked.into_iter().map(PopularProductEntry::from).collect())
  }

  /// The caller's orders, newest first. Relations are loaded only as deep as
  /// the selection set asks for.
  async fn orders(&self, ctx: &Context<'_>) -> FieldResult<Vec<Order>> {
    let context = ctx.data::<GraphQLContext>()?;
    let viewer = require_viewer(ctx)?;
    let selection = ctx.look_ahead();
    let line_items = selection.field("orderProducts");
    let prefetch = if line_items.field("product").exists() {
      OrderPrefetch::LineItemsWithProducts
    } else if line_items.exists() || selection.field("totalQuantity").exists() {
      OrderPrefetch::LineItems
    } else {
      OrderPrefetch::None
    };
    let orders = context.orders.list_orders(viewer, prefetch).await.map_err(to_graphql_error)?;
    Ok(orders.into_iter().map(Order::from).collect())
  }
}

pub(crate) fn require_viewer<'a>(ctx: &Context<'a>) -> FieldResult<&'a Viewer> {
  ctx
    .data_opt::<Viewer>()
    .ok_or_else(|| to_graphql_error(CoreError::Unauthorized("Authentication credentials were not provided.".to_string())))
}

pub(crate) fn parse_id(id: &ID) -> FieldResult<i64> {
  id.parse::<i64>()
    .map_err(|_| to_graphql_error(CoreError::Validation(format!("'{}' is not a valid id.", id.as_str()))))
}
