// storefront_server/src/services/auth_service.rs

//! Password hashing plus the account operations built on it: user creation,
//! credential checks, API tokens and login sessions.

use crate::errors::AppError; // Application-specific error type
use argon2::{
  password_hash::{
    rand_core::OsRng, // For generating random salts
    PasswordHash,
    PasswordHasher,   // The main trait for hashing
    PasswordVerifier, // The main trait for verifying
    SaltString,
  },
  Argon2, // The Argon2 algorithm instance
};
use storefront_core::models::{NewUser, Session, User};
use storefront_core::{CoreError, Storage};
use tracing::{debug, error, info, instrument, warn};

const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

/// Hashes a plain-text password using Argon2.
#[instrument(name = "auth_service::hash_password", skip(password), err(Display))]
pub fn hash_password(password: &str) -> Result<String, AppError> {
  debug!("Attempting to hash password.");
  if password.is_empty() {
    return Err(AppError::Core(CoreError::Validation(
      "Password cannot be empty.".to_string(),
    )));
  }

  let salt = SaltString::generate(&mut OsRng); // Generate a cryptographically secure random salt
  let argon2_hasher = Argon2::default();

  match argon2_hasher.hash_password(password.as_bytes(), &salt) {
    Ok(password_hash_obj) => Ok(password_hash_obj.to_string()),
    Err(argon_err) => {
      error!(error = %argon_err, "Argon2 password hashing failed.");
      Err(AppError::Internal(format!(
        "Password hashing process failed: {}",
        argon_err
      )))
    }
  }
}

/// Verifies a plain-text password against a stored Argon2 hash.
///
/// Returns `Ok(false)` on a mismatch; errors only for unusable stored hashes.
#[instrument(name = "auth_service::verify_password", skip(hashed_password_str, provided_password), err(Display), fields(hash_len = hashed_password_str.len()))]
pub fn verify_password(hashed_password_str: &str, provided_password: &str) -> Result<bool, AppError> {
  if hashed_password_str.is_empty() || provided_password.is_empty() {
    return Ok(false);
  }

  // Parse the stored hash string into a PasswordHash object
  let parsed_hash = match PasswordHash::new(hashed_password_str) {
    Ok(ph) => ph,
    Err(parse_err) => {
      error!(error = %parse_err, "Failed to parse stored password hash string.");
      return Err(AppError::Internal(format!(
        "Invalid stored password hash format: {}",
        parse_err
      )));
    }
  };

  match Argon2::default().verify_password(provided_password.as_bytes(), &parsed_hash) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("Password verification failed: Passwords do not match.");
      Ok(false)
    }
    Err(other_argon_err) => {
      error!(error = %other_argon_err, "Argon2 password verification process encountered an error.");
      Err(AppError::Internal(format!(
        "Password verification process failed: {}",
        other_argon_err
      )))
    }
  }
}

#[instrument(name = "auth_service::create_user", skip(storage, password))]
pub async fn create_user(
  storage: &dyn Storage,
  username: &str,
  email: &str,
  password: &str,
  is_superuser: bool,
) -> Result<User, AppError> {
  let username = username.trim();
  if username.is_empty() {
    return Err(AppError::Core(CoreError::Validation("Username may not be blank.".to_string())));
  }
  let password_hash = hash_password(password)?;
  let user = storage
    .insert_user(NewUser {
      username: username.to_string(),
      email: email.trim().to_string(),
      password_hash,
      is_superuser,
    })
    .await?;
  info!(user_id = user.id, "User created.");
  Ok(user)
}

/// Checks a username/password pair. Unknown users and wrong passwords are
/// indistinguishable to the caller.
#[instrument(name = "auth_service::authenticate", skip(storage, password))]
pub async fn authenticate(storage: &dyn Storage, username: &str, password: &str) -> Result<User, AppError> {
  let Some(user) = storage.find_user_by_username(username).await? else {
    warn!("Login attempt for unknown user.");
    return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
  };
  if !verify_password(&user.password_hash, password)? {
    warn!(user_id = user.id, "Login attempt with wrong password.");
    return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
  }
  Ok(user)
}

/// Returns the user's API token, creating it on first use.
pub async fn issue_token(storage: &dyn Storage, username: &str, password: &str) -> Result<String, AppError> {
  let user = authenticate(storage, username, password).await?;
  Ok(storage.get_or_create_token(user.id).await?)
}

pub async fn login(
  storage: &dyn Storage,
  username: &str,
  password: &str,
  ttl: std::time::Duration,
) -> Result<(User, Session), AppError> {
  let user = authenticate(storage, username, password).await?;
  let ttl = chrono::Duration::from_std(ttl).map_err(|e| AppError::Config(format!("Invalid session lifetime: {}", e)))?;
  let session = storage.insert_session(user.id, ttl).await?;
  info!(user_id = user.id, "Session opened.");
  Ok((user, session))
}
