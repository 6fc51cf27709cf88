//! Password hashing.
//!
//! Argon2id with a random salt per hash, stored in PHC string format.
//! Both operations are CPU-bound; the async wrappers run them on tokio's
//! blocking pool.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

use crate::error::AppError;

/// Shortest password accepted by registration and the admin API.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password")]
    HashingFailed,
    #[error("password does not match")]
    Mismatch,
    #[error("stored password hash is malformed")]
    InvalidHashFormat,
}

/// Hashes `password` with a freshly generated salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PasswordError::HashingFailed)
}

/// Checks `password` against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| PasswordError::Mismatch)
}

/// Length rule shared by every endpoint that accepts a new password.
pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// hash_password on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::internal(e.to_string()))?
        .map_err(|e| AppError::internal(e.to_string()))
}

/// verify_password on the blocking pool. `Ok(false)` for a wrong password or an
/// unreadable stored hash.
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AppError> {
    let outcome = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::internal(e.to_string()))?;

    match outcome {
        Ok(()) => Ok(true),
        Err(PasswordError::Mismatch) => Ok(false),
        // An unreadable hash counts as a mismatch.
        Err(PasswordError::InvalidHashFormat) => {
            tracing::warn!("stored password hash could not be parsed");
            Ok(false)
        }
        Err(e) => Err(AppError::internal(e.to_string())),
    }
}
