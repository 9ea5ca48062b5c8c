// storefront_core/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Errors raised by the domain layer.
///
/// The user-facing variants display their message verbatim so that both the
/// REST layer and the GraphQL layer can surface them unchanged.
#[derive(Debug, Error)]
pub enum CoreError {
  #[error("{0}")]
  Validation(String),

  #[error("{0}")]
  Unauthorized(String),

  #[error("{0}")]
  Forbidden(String),

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  Conflict(String),

  #[error("Storage backend failure. Source: {source}")]
  Storage {
    #[source]
    source: AnyhowError,
  },

  #[error("Cache backend failure: {0}")]
  Cache(String),

  #[error("Job queue failure: {0}")]
  Queue(String),

  #[error("Thumbnail derivation failed: {0}")]
  Thumbnail(String),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl CoreError {
  /// Stable machine-readable code, used for GraphQL error extensions.
  pub fn code(&self) -> &'static str {
    match self {
      CoreError::Validation(_) | CoreError::Thumbnail(_) => "VALIDATION",
      CoreError::Unauthorized(_) => "UNAUTHORIZED",
      CoreError::Forbidden(_) => "FORBIDDEN",
      CoreError::NotFound(_) => "NOT_FOUND",
      CoreError::Conflict(_) => "CONFLICT",
      CoreError::Storage { .. } | CoreError::Cache(_) | CoreError::Queue(_) | CoreError::Internal(_) => "INTERNAL",
    }
  }

  pub fn storage(source: impl Into<AnyhowError>) -> Self {
    CoreError::Storage { source: source.into() }
  }
}

impl From<AnyhowError> for CoreError {
  fn from(err: AnyhowError) -> Self {
    // Keep an already-typed error instead of nesting it inside Storage.
    match err.downcast::<CoreError>() {
      Ok(core_err) => core_err,
      Err(err) => CoreError::Storage { source: err },
    }
  }
}

pub type CoreResult<T, E = CoreError> = std::result::Result<T, E>;
