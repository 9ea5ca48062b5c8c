// storefront_server/src/errors.rs

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use storefront_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error(transparent)]
  Core(#[from] CoreError),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Migration Error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  #[error("Internal Server Error: {0}")]
  Internal(String), // For miscellaneous errors
}

// Allow anyhow::Error to be converted into AppError for convenience in handlers
impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    if err.is::<CoreError>() {
      return AppError::Core(CoreError::from(err));
    }
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(err) => AppError::Internal(err.to_string()),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Core(core) => match core {
        CoreError::Validation(_) | CoreError::Thumbnail(_) => StatusCode::BAD_REQUEST,
        CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Conflict(_) => StatusCode::CONFLICT,
        CoreError::Storage { .. } | CoreError::Cache(_) | CoreError::Queue(_) | CoreError::Internal(_) => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Migrate(_) | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    // Log the full error when it's turned into a response
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, %status, "Responding with client error");
    }
    let body = match self {
      AppError::Core(core) if !status.is_server_error() => json!({"error": core.to_string(), "code": core.code()}),
      AppError::Auth(m) => json!({"error": m, "code": "UNAUTHORIZED"}),
      AppError::Sqlx(_) => json!({"error": "Database operation failed"}),
      AppError::Config(m) => json!({"error": "Configuration issue", "detail": m}),
      _ => json!({"error": "An internal error occurred"}),
    };
    HttpResponse::build(status).json(body)
  }
}

// Define a Result type alias for the application
pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn core_errors_map_to_http_statuses() {
    let cases = [
      (CoreError::Validation("bad".into()), StatusCode::BAD_REQUEST),
      (CoreError::Thumbnail("bad image".into()), StatusCode::BAD_REQUEST),
      (CoreError::Unauthorized("who".into()), StatusCode::UNAUTHORIZED),
      (CoreError::NotFound("gone".into()), StatusCode::NOT_FOUND),
      (CoreError::Conflict("dup".into()), StatusCode::CONFLICT),
      (CoreError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (core, expected) in cases {
      assert_eq!(AppError::from(core).status_code(), expected);
    }
  }

  #[test]
  fn anyhow_keeps_typed_core_errors() {
    let err = AppError::from(anyhow::Error::new(CoreError::NotFound("Order x not found.".into())));
    assert!(matches!(err, AppError::Core(CoreError::NotFound(_))));
  }
}
