// storefront_server/src/web/handlers/auth_handlers.rs

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::services::auth_service;
use crate::state::AppState;
use crate::web::extractors::SESSION_COOKIE;

#[derive(Deserialize, Debug)]
pub struct CredentialsPayload {
  pub username: String,
  pub password: String,
}

#[instrument(name = "handler::obtain_token", skip(app_state, payload), fields(username = %payload.username))]
pub async fn obtain_token_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CredentialsPayload>,
) -> Result<HttpResponse, AppError> {
  let token = auth_service::issue_token(app_state.storage.as_ref(), &payload.username, &payload.password).await?;
  Ok(HttpResponse::Ok().json(json!({ "token": token })))
}

#[instrument(name = "handler::login", skip(app_state, payload), fields(username = %payload.username))]
pub async fn login_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CredentialsPayload>,
) -> Result<HttpResponse, AppError> {
  let (user, session) = auth_service::login(
    app_state.storage.as_ref(),
    &payload.username,
    &payload.password,
    app_state.config.session_ttl,
  )
  .await?;
  let max_age = CookieDuration::seconds(app_state.config.session_ttl.as_secs() as i64);
  let cookie = Cookie::build(SESSION_COOKIE, session.key)
    .path("/")
    .http_only(true)
    .same_site(SameSite::Lax)
    .max_age(max_age)
    .finish();
  info!(user_id = user.id, "User logged in.");
  Ok(HttpResponse::Ok().cookie(cookie).json(user))
}

/// Ends the cookie session, if there is one. Always succeeds.
#[instrument(name = "handler::logout", skip(app_state, req))]
pub async fn logout_handler(app_state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, AppError> {
  if let Some(cookie) = req.cookie(SESSION_COOKIE) {
    app_state.storage.delete_session(cookie.value()).await?;
    info!("Session closed.");
  }
  let mut removal = Cookie::build(SESSION_COOKIE, "").path("/").finish();
  removal.make_removal();
  Ok(HttpResponse::NoContent().cookie(removal).finish())
}
