// storefront_server/src/graphql/mutation.rs

use async_graphql::{Context, FieldResult, Object};
use storefront_core::models::{LineItemInput, Viewer};
use tracing::info;

use super::query::parse_id;
use super::schema::{to_graphql_error, GraphQLContext};
use super::types::{CreateOrderPayload, CreateOrderProductInput};

pub struct Mutation;

#[Object]
impl Mutation {
  /// Creates an order in one bulk write. Prices are derived from the current
  /// product prices; any submitted price is ignored.
  async fn create_order(
    &self,
    ctx: &Context<'_>,
    order_products: Vec<CreateOrderProductInput>,
  ) -> FieldResult<CreateOrderPayload> {
    let context = ctx.data::<GraphQLContext>()?;
    let items = order_products
      .into_iter()
      .map(|input| {
        Ok(LineItemInput {
          product_id: parse_id(&input.product_id)?,
          quantity: input.quantity,
          price: input.price,
        })
      })
      .collect::<FieldResult<Vec<_>>>()?;
    let order = context
      .orders
      .create_order(ctx.data_opt::<Viewer>(), items)
      .await
      .map_err(to_graphql_error)?;
    info!(order_id = %order.order.id, "Order created through GraphQL.");
    Ok(CreateOrderPayload { order: order.into() })
  }
}
