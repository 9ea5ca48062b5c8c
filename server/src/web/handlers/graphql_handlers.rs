// storefront_server/src/web/handlers/graphql_handlers.rs

use actix_web::{web, HttpResponse};
use async_graphql::http::GraphiQLSource;
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse};

use crate::state::AppState;
use crate::web::extractors::OptionalViewer;

/// Executes a GraphQL request. The viewer is attached only for authenticated
/// callers, so resolvers see anonymous requests as a missing `Viewer`.
pub async fn graphql_handler(
  app_state: web::Data<AppState>,
  viewer: OptionalViewer,
  request: GraphQLRequest,
) -> GraphQLResponse {
  let mut request = request.into_inner();
  if let OptionalViewer(Some(viewer)) = viewer {
    request = request.data(viewer);
  }
  app_state.schema.execute(request).await.into()
}

pub async fn graphiql_handler() -> HttpResponse {
  HttpResponse::Ok()
    .content_type("text/html; charset=utf-8")
    .body(GraphiQLSource::build().endpoint("/graphql").finish())
}
