// storefront_server/src/web/extractors.rs

//! Request authentication. A request is authenticated by an
//! `Authorization: Token <key>` header or by a `sessionid` cookie.

use std::ops::Deref;

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use storefront_core::models::{User, Viewer};
use storefront_core::CoreError;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sessionid";

/// The caller, if any. A bad token is rejected; a stale session cookie just
/// leaves the request anonymous.
#[derive(Debug, Clone)]
pub struct OptionalViewer(pub Option<Viewer>);

/// Rejects anonymous requests with 401.
#[derive(Debug, Clone)]
pub struct AuthenticatedViewer(pub Viewer);

impl Deref for AuthenticatedViewer {
  type Target = Viewer;

  fn deref(&self) -> &Viewer {
    &self.0
  }
}

enum Credential {
  Token(String),
  Session(String),
}

fn credential(req: &HttpRequest) -> Result<Option<Credential>, AppError> {
  if let Some(value) = req.headers().get(header::AUTHORIZATION) {
    let value = value
      .to_str()
      .map_err(|_| AppError::Auth("Invalid token header.".to_string()))?;
    let mut parts = value.split_whitespace();
    return match (parts.next(), parts.next(), parts.next()) {
      (Some(scheme), Some(key), None) if scheme.eq_ignore_ascii_case("token") => {
        Ok(Some(Credential::Token(key.to_string())))
      }
      (Some(scheme), None, None) if scheme.eq_ignore_ascii_case("token") => Err(AppError::Auth(
        "Invalid token header. No credentials provided.".to_string(),
      )),
      // Other schemes are not ours to judge.
      _ => Ok(req.cookie(SESSION_COOKIE).map(|c| Credential::Session(c.value().to_string()))),
    };
  }
  Ok(req.cookie(SESSION_COOKIE).map(|c| Credential::Session(c.value().to_string())))
}

async fn resolve(state: web::Data<AppState>, credential: Option<Credential>) -> Result<Option<Viewer>, AppError> {
  let user: Option<User> = match credential {
    None => None,
    Some(Credential::Token(key)) => {
      let user = state.storage.user_for_token(&key).await?;
      if user.is_none() {
        warn!("Request carried an unknown API token.");
        return Err(AppError::Auth("Invalid token.".to_string()));
      }
      user
    }
    Some(Credential::Session(key)) => {
      let user = state.storage.user_for_session(&key).await?;
      if user.is_none() {
        debug!("Ignoring expired or unknown session cookie.");
      }
      user
    }
  };
  Ok(user.as_ref().map(Viewer::from))
}

impl FromRequest for OptionalViewer {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let state = req.app_data::<web::Data<AppState>>().cloned();
    let credential = credential(req);
    Box::pin(async move {
      let state = state.ok_or_else(|| AppError::Internal("Application state is not configured.".to_string()))?;
      Ok(OptionalViewer(resolve(state, credential?).await?))
    })
  }
}

impl FromRequest for AuthenticatedViewer {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
    let optional = OptionalViewer::from_request(req, payload);
    Box::pin(async move {
      match optional.await? {
        OptionalViewer(Some(viewer)) => Ok(AuthenticatedViewer(viewer)),
        OptionalViewer(None) => Err(AppError::Core(CoreError::Unauthorized(
          "Authentication credentials were not provided.".to_string(),
        ))),
      }
    })
  }
}
