//! Password hashing
//!
//! Passwords are stored as bcrypt digests (`$2b$<cost>$<salt+hash>`), the
//! same format the flat-file store used, so imported digests verify as-is.
//! The salt is embedded in the digest.

use crate::{Error, Result};

/// bcrypt work factor for new digests
pub const HASH_COST: u32 = 10;

const DIGEST_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];
const DIGEST_LEN: usize = 60;

/// Whether `value` has the shape of a bcrypt digest
pub fn is_password_hash(value: &str) -> bool {
    value.len() == DIGEST_LEN && DIGEST_PREFIXES.iter().any(|p| value.starts_with(p))
}

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, HASH_COST)
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a password against a stored digest
///
/// Malformed digests never verify.
pub fn verify_password(password: &str, hash: &str) -> bool {
    if !is_password_hash(hash) {
        return false;
    }
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// [`hash_password`] on the blocking thread pool
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| Error::Internal(format!("Password hashing task failed: {}", e)))?
}

/// [`verify_password`] on the blocking thread pool
pub async fn verify_password_blocking(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .unwrap_or(false)
}
