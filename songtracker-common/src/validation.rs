//! User record validation
//!
//! Field rules shared by registration, profile updates, the integrity check
//! and the legacy JSON store.

use crate::{Error, Result};
use serde_json::Value;

/// Maximum name length in characters
pub const MAX_NAME_LEN: usize = 50;

/// Maximum password length in characters
pub const MAX_PASSWORD_LEN: usize = 100;

/// Keys a legacy JSON user record must have, and no others
pub const LEGACY_USER_FIELDS: [&str; 5] =
    ["name", "email", "password", "trackedSongs", "completedSongs"];

/// Validate a display name
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("Name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "Name must not exceed {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

/// Validate an email address
///
/// Accepts `local@domain.tld` shapes: no whitespace, exactly one `@`, and a
/// dot inside the domain with text on both sides.
pub fn validate_email(email: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(Error::InvalidInput("Email is required".to_string()));
    }
    if !is_valid_email(email) {
        return Err(Error::InvalidInput(
            "Please provide a valid email address".to_string(),
        ));
    }
    Ok(())
}

/// Validate a plain-text password
pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(Error::InvalidInput("Password is required".to_string()));
    }
    if password.chars().count() > MAX_PASSWORD_LEN {
        return Err(Error::InvalidInput(format!(
            "Password must not exceed {} characters",
            MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Run several field checks and report every failure at once
pub fn collect_errors(results: impl IntoIterator<Item = Result<()>>) -> Result<()> {
    let messages: Vec<String> = results
        .into_iter()
        .filter_map(|r| r.err())
        .map(|e| e.message())
        .collect();

    if messages.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidInput(messages.join("; ")))
    }
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() {
        return false;
    }

    // Some dot with non-empty text on both sides
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Check that a legacy JSON user record has exactly the expected shape
pub fn ensure_correct_user_format(user: &Value) -> Result<()> {
    let Some(obj) = user.as_object() else {
        return Err(Error::InvalidInput("User must be a JSON object".to_string()));
    };

    let missing: Vec<&str> = LEGACY_USER_FIELDS
        .iter()
        .copied()
        .filter(|f| !obj.contains_key(*f))
        .collect();
    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "User is missing required fields: {}",
            missing.join(", ")
        )));
    }

    if obj.len() != LEGACY_USER_FIELDS.len() {
        return Err(Error::InvalidInput(
            "User has extra fields or incorrect structure".to_string(),
        ));
    }

    for list in ["trackedSongs", "completedSongs"] {
        if !obj[list].is_array() {
            return Err(Error::InvalidInput(format!("{} must be an array", list)));
        }
    }

    Ok(())
}
