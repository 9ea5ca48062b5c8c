// storefront_server/src/web/handlers/catalog_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::instrument;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct NamePayload {
  pub name: String,
}

pub async fn list_categories_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.catalog.list_categories().await?))
}

#[instrument(name = "handler::create_category", skip(app_state, payload), fields(name = %payload.name))]
pub async fn create_category_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<NamePayload>,
) -> Result<HttpResponse, AppError> {
  let category = app_state.catalog.create_category(&payload.name).await?;
  Ok(HttpResponse::Created().json(category))
}

pub async fn list_tags_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.catalog.list_tags().await?))
}

#[instrument(name = "handler::create_tag", skip(app_state, payload), fields(name = %payload.name))]
pub async fn create_tag_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<NamePayload>,
) -> Result<HttpResponse, AppError> {
  let tag = app_state.catalog.create_tag(&payload.name).await?;
  Ok(HttpResponse::Created().json(tag))
}
