// storefront_server/src/web/handlers/product_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use storefront_core::models::{ProductInput, ProductPatch};
use storefront_core::ProductQuery;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct PageParam {
  pub page: Option<u32>,
}

#[instrument(name = "handler::list_products", skip(app_state, query), fields(page = ?page.page))]
pub async fn list_products_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ProductQuery>,
  page: web::Query<PageParam>,
) -> Result<HttpResponse, AppError> {
  let page = app_state.catalog.list_products(&query, page.page).await?;
  info!(count = page.count, returned = page.results.len(), "Products listed.");
  Ok(HttpResponse::Ok().json(page))
}

#[instrument(name = "handler::get_product", skip(app_state, path), fields(product_id = %path.as_ref()))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
  let product = app_state.catalog.get_product(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(product))
}

#[instrument(name = "handler::create_product", skip(app_state, payload), fields(name = %payload.name))]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<ProductInput>,
) -> Result<HttpResponse, AppError> {
  let product = app_state.catalog.create_product(payload.into_inner()).await?;
  info!(product_id = product.id, "Product created.");
  Ok(HttpResponse::Created().json(product))
}

#[instrument(name = "handler::replace_product", skip(app_state, path, payload), fields(product_id = %path.as_ref()))]
pub async fn replace_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<i64>,
  payload: web::Json<ProductInput>,
) -> Result<HttpResponse, AppError> {
  let product = app_state
    .catalog
    .replace_product(path.into_inner(), payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(product))
}

#[instrument(name = "handler::patch_product", skip(app_state, path, payload), fields(product_id = %path.as_ref()))]
pub async fn patch_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<i64>,
  payload: web::Json<ProductPatch>,
) -> Result<HttpResponse, AppError> {
  let product = app_state
    .catalog
    .patch_product(path.into_inner(), payload.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(product))
}

#[instrument(name = "handler::delete_product", skip(app_state, path), fields(product_id = %path.as_ref()))]
pub async fn delete_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
  app_state.catalog.delete_product(path.into_inner()).await?;
  Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "handler::popular_products", skip(app_state))]
pub async fn popular_products_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let ranked = app_state.catalog.popular_products().await?;
  Ok(HttpResponse::Ok().json(ranked))
}
