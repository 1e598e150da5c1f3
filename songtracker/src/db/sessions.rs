//! Login session storage
//!
//! Sessions are server-side rows keyed by an opaque random token; the token
//! is the only thing the client holds (in a cookie).

use songtracker_common::db::User;
use songtracker_common::time::now_millis;
use songtracker_common::Result;
use sqlx::SqlitePool;
use std::time::Duration;
use uuid::Uuid;

use super::users::user_from_row;

/// Open a session for `user_id`, returning its token
pub async fn create_session(pool: &SqlitePool, user_id: i64, ttl: Duration) -> Result<String> {
    let token = Uuid::new_v4().simple().to_string();
    let now = now_millis();
    let expires_at = now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX));

    sqlx::query("INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(&token)
        .bind(user_id)
        .bind(now)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(token)
}

/// Resolve a token to its user; expired sessions resolve to `None`
pub async fn lookup_session(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT u.id, u.name, u.email, u.password_hash, u.role,
               u.created_at, u.updated_at
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token = ? AND s.expires_at > ?
        "#,
    )
    .bind(token)
    .bind(now_millis())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// End a session; returns whether it existed
pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Drop every expired session; returns how many were removed
pub async fn purge_expired_sessions(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now_millis())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
