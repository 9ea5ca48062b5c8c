// storefront_server/src/web/routes.rs

use actix_web::{error::InternalError, web, HttpResponse};
use serde_json::json;

use crate::web::handlers::{auth_handlers, catalog_handlers, graphql_handlers, order_handlers, product_handlers};

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Malformed JSON bodies answer with the same `{error, code}` shape as
/// validation failures.
pub fn json_config() -> web::JsonConfig {
  web::JsonConfig::default().error_handler(|err, _req| {
    let message = err.to_string();
    tracing::warn!(error = %message, "Rejected request body.");
    let response = HttpResponse::BadRequest().json(json!({ "error": message, "code": "VALIDATION" }));
    InternalError::from_response(err, response).into()
  })
}

pub fn query_config() -> web::QueryConfig {
  web::QueryConfig::default().error_handler(|err, _req| {
    let message = err.to_string();
    let response = HttpResponse::BadRequest().json(json!({ "error": message, "code": "VALIDATION" }));
    InternalError::from_response(err, response).into()
  })
}

// Paths are registered without trailing slashes; `NormalizePath` strips them
// from incoming requests.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .app_data(json_config())
    .app_data(query_config())
    .service(
      web::scope("/api")
        .route("/health", web::get().to(health_check_handler))
        .service(
          web::scope("/products")
            .route("", web::get().to(product_handlers::list_products_handler))
            .route("", web::post().to(product_handlers::create_product_handler))
            .route("/popular", web::get().to(product_handlers::popular_products_handler))
            .route("/{product_id}", web::get().to(product_handlers::get_product_handler))
            .route("/{product_id}", web::put().to(product_handlers::replace_product_handler))
            .route("/{product_id}", web::patch().to(product_handlers::patch_product_handler))
            .route("/{product_id}", web::delete().to(product_handlers::delete_product_handler)),
        )
        .service(
          web::resource("/categories")
            .route(web::get().to(catalog_handlers::list_categories_handler))
            .route(web::post().to(catalog_handlers::create_category_handler)),
        )
        .service(
          web::resource("/tags")
            .route(web::get().to(catalog_handlers::list_tags_handler))
            .route(web::post().to(catalog_handlers::create_tag_handler)),
        )
        .service(
          web::scope("/orders")
            .route("", web::get().to(order_handlers::list_orders_handler))
            .route("", web::post().to(order_handlers::create_order_handler))
            .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
            .route("/{order_id}", web::delete().to(order_handlers::delete_order_handler))
            .route("/{order_id}/items", web::post().to(order_handlers::add_line_item_handler))
            .route(
              "/{order_id}/items/{item_id}",
              web::patch().to(order_handlers::update_line_item_handler),
            )
            .route(
              "/{order_id}/items/{item_id}",
              web::delete().to(order_handlers::remove_line_item_handler),
            ),
        ),
    )
    .route("/api-token-auth", web::post().to(auth_handlers::obtain_token_handler))
    .route("/accounts/login", web::post().to(auth_handlers::login_handler))
    .route("/logout", web::post().to(auth_handlers::logout_handler))
    .service(
      web::resource("/graphql")
        .route(web::post().to(graphql_handlers::graphql_handler))
        .route(web::get().to(graphql_handlers::graphiql_handler)),
    );
}
