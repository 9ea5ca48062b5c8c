// storefront_server/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use storefront_core::models::{LineItemInput, OrderPrefetch};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::{AuthenticatedViewer, OptionalViewer};

#[derive(Deserialize, Debug)]
pub struct CreateOrderPayload {
  pub order_products: Vec<LineItemInput>,
}

#[derive(Deserialize, Debug)]
pub struct LineItemQuantityPayload {
  pub quantity: Decimal,
}

/// REST listings always carry line items with their products.
#[instrument(name = "handler::list_orders", skip(app_state, viewer), fields(user_id = viewer.user_id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  viewer: AuthenticatedViewer,
) -> Result<HttpResponse, AppError> {
  let orders = app_state
    .orders
    .list_orders(&viewer, OrderPrefetch::LineItemsWithProducts)
    .await?;
  Ok(HttpResponse::Ok().json(orders))
}

/// Anonymous callers reach the service so the rejection carries the
/// order-specific message.
#[instrument(name = "handler::create_order", skip(app_state, viewer, payload), fields(items = payload.order_products.len()))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  viewer: OptionalViewer,
  payload: web::Json<CreateOrderPayload>,
) -> Result<HttpResponse, AppError> {
  let order = app_state
    .orders
    .create_order(viewer.0.as_ref(), payload.into_inner().order_products)
    .await?;
  info!(order_id = %order.order.id, "Order created.");
  Ok(HttpResponse::Created().json(order))
}

#[instrument(name = "handler::get_order", skip(app_state, viewer, path), fields(order_id = %path.as_ref()))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  viewer: AuthenticatedViewer,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = app_state.orders.get_order(&viewer, path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::delete_order", skip(app_state, viewer, path), fields(order_id = %path.as_ref()))]
pub async fn delete_order_handler(
  app_state: web::Data<AppState>,
  viewer: AuthenticatedViewer,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  app_state.orders.delete_order(&viewer, path.into_inner()).await?;
  Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "handler::add_line_item", skip(app_state, viewer, path, payload), fields(order_id = %path.as_ref()))]
pub async fn add_line_item_handler(
  app_state: web::Data<AppState>,
  viewer: AuthenticatedViewer,
  path: web::Path<Uuid>,
  payload: web::Json<LineItemInput>,
) -> Result<HttpResponse, AppError> {
  let order = app_state
    .orders
    .add_line_item(&viewer, path.into_inner(), payload.into_inner())
    .await?;
  Ok(HttpResponse::Created().json(order))
}

#[instrument(name = "handler::update_line_item", skip(app_state, viewer, path, payload))]
pub async fn update_line_item_handler(
  app_state: web::Data<AppState>,
  viewer: AuthenticatedViewer,
  path: web::Path<(Uuid, i64)>,
  payload: web::Json<LineItemQuantityPayload>,
) -> Result<HttpResponse, AppError> {
  let (order_id, item_id) = path.into_inner();
  let order = app_state
    .orders
    .update_line_item(&viewer, order_id, item_id, payload.quantity)
    .await?;
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::remove_line_item", skip(app_state, viewer, path))]
pub async fn remove_line_item_handler(
  app_state: web::Data<AppState>,
  viewer: AuthenticatedViewer,
  path: web::Path<(Uuid, i64)>,
) -> Result<HttpResponse, AppError> {
  let (order_id, item_id) = path.into_inner();
  let order = app_state.orders.remove_line_item(&viewer, order_id, item_id).await?;
  Ok(HttpResponse::Ok().json(order))
}
