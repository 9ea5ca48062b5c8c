// storefront_core/src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub id: i64,
  pub username: String,
  pub email: String,
  #[serde(skip_serializing)] // Never send password hash to client
  pub password_hash: String,
  pub is_superuser: bool,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
  pub username: String,
  pub email: String,
  pub password_hash: String,
  pub is_superuser: bool,
}

#[derive(Debug, Clone)]
pub struct Session {
  pub key: String,
  pub user_id: i64,
  pub expires_at: DateTime<Utc>,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
  pub user_id: i64,
  pub username: String,
  pub is_superuser: bool,
}

impl From<&User> for Viewer {
  fn from(user: &User) -> Self {
    Self {
      user_id: user.id,
      username: user.username.clone(),
      is_superuser: user.is_superuser,
    }
  }
}

/// Random hex key for API tokens and sessions.
pub fn generate_key() -> String {
  Uuid::new_v4().simple().to_string()
}
