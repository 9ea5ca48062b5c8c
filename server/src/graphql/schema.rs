// storefront_server/src/graphql/schema.rs

use async_graphql::{EmptySubscription, ErrorExtensions, Schema};
use storefront_core::{CatalogService, CoreError, OrderService};

use super::{Mutation, Query};

/// Services shared by every resolver. The caller's `Viewer`, when
/// authenticated, is attached per request.
pub struct GraphQLContext {
  pub catalog: CatalogService,
  pub orders: OrderService,
}

pub type StorefrontSchema = Schema<Query, Mutation, EmptySubscription>;

pub fn create_schema(catalog: CatalogService, orders: OrderService) -> StorefrontSchema {
  Schema::build(Query, Mutation, EmptySubscription)
    .data(GraphQLContext { catalog, orders })
    .finish()
}

/// Domain errors surface with their message and a `code` extension; internal
/// failures are logged and reported generically.
pub fn to_graphql_error(err: CoreError) -> async_graphql::Error {
  let code = err.code();
  let message = if code == "INTERNAL" {
    tracing::error!(error = %err, "GraphQL resolver failed.");
    "Internal server error.".to_string()
  } else {
    err.to_string()
  };
  async_graphql::Error::new(message).extend_with(|_, extensions| extensions.set("code", code))
}
