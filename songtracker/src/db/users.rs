//! User database operations
//!
//! Every mutation is a read-modify-write against the `users` table: the row
//! is loaded, validated changes are applied, and the result is written back.

use songtracker_common::db::{NewUser, Role, User, UserSummary, UserUpdate};
use songtracker_common::password::{hash_password_blocking, is_password_hash};
use songtracker_common::time::now_millis;
use songtracker_common::validation::{collect_errors, validate_email, validate_name};
use songtracker_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, created_at, updated_at";

/// Canonical stored form of an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn user_from_row(row: &SqliteRow) -> Result<User> {
    let role: String = row.get("role");
    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: role.parse()?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Map a UNIQUE(email) violation to a conflict
fn map_unique_email(err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Conflict("Email is already registered".to_string())
        }
        _ => Error::Database(err),
    }
}

fn check_password_hash(hash: &str) -> Result<()> {
    if is_password_hash(hash) {
        Ok(())
    } else {
        Err(Error::InvalidInput("Password hash is malformed".to_string()))
    }
}

async fn ensure_email_free(pool: &SqlitePool, email: &str) -> Result<()> {
    if find_user_by_email(pool, email).await?.is_some() {
        return Err(Error::Conflict("Email is already registered".to_string()));
    }
    Ok(())
}

async fn insert_user(pool: &SqlitePool, name: &str, email: &str, password_hash: &str) -> Result<User> {
    let now = now_millis();

    let id = sqlx::query(
        r#"
        INSERT INTO users (name, email, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(Role::User.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(map_unique_email)?
    .last_insert_rowid();

    info!(user_id = id, "Registered new user");

    get_user(pool, id).await
}

/// Register a new user with the default role
pub async fn create_user(pool: &SqlitePool, new_user: &NewUser) -> Result<User> {
    let new_user = NewUser {
        name: new_user.name.trim().to_string(),
        email: normalize_email(&new_user.email),
        password: new_user.password.clone(),
    };
    new_user.validate()?;
    ensure_email_free(pool, &new_user.email).await?;

    let hash = hash_password_blocking(new_user.password).await?;
    insert_user(pool, &new_user.name, &new_user.email, &hash).await
}

/// Register a user whose password is already a bcrypt digest
///
/// Used when importing accounts; the digest is stored unchanged.
pub async fn create_user_with_hash(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<User> {
    let name = name.trim();
    let email = normalize_email(email);
    collect_errors([
        validate_name(name),
        validate_email(&email),
        check_password_hash(password_hash),
    ])?;
    ensure_email_free(pool, &email).await?;

    insert_user(pool, name, &email, password_hash).await
}

/// Load user by id
pub async fn find_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(user_from_row).transpose()
}

/// Load user by email (normalized before lookup)
pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

/// Load user by id, failing with `NotFound` if absent
pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<User> {
    find_user_by_id(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {} not found", id)))
}

/// All users in registration order
pub async fn list_users(pool: &SqlitePool) -> Result<Vec<UserSummary>> {
    let rows = sqlx::query("SELECT id, name, email FROM users ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| UserSummary {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
        })
        .collect())
}

pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Apply a partial update; fields not present in `update` are kept
pub async fn update_user(pool: &SqlitePool, id: i64, update: &UserUpdate) -> Result<User> {
    if update.is_empty() {
        return Err(Error::InvalidInput("No fields to update".to_string()));
    }
    update.validate()?;

    let mut user = get_user(pool, id).await?;

    if let Some(name) = &update.name {
        user.name = name.trim().to_string();
    }
    if let Some(email) = &update.email {
        let email = normalize_email(email);
        if email != user.email {
            if let Some(existing) = find_user_by_email(pool, &email).await? {
                if existing.id != id {
                    return Err(Error::Conflict("Email is already registered".to_string()));
                }
            }
        }
        user.email = email;
    }
    if let Some(password) = &update.password {
        user.password_hash = hash_password_blocking(password.clone()).await?;
    }
    user.updated_at = now_millis();

    sqlx::query(
        r#"
        UPDATE users
        SET name = ?, email = ?, password_hash = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.updated_at)
    .bind(id)
    .execute(pool)
    .await
    .map_err(map_unique_email)?;

    Ok(user)
}

/// Delete a user; song lists and sessions go with it
pub async fn delete_user(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("User {} not found", id)));
    }

    info!(user_id = id, "Deleted user");
    Ok(())
}

/// Change the role of the user with `email`
pub async fn set_role(pool: &SqlitePool, email: &str, role: Role) -> Result<User> {
    let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE email = ?")
        .bind(role.as_str())
        .bind(now_millis())
        .bind(normalize_email(email))
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("No user with email {}", email.trim())));
    }

    find_user_by_email(pool, email)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No user with email {}", email.trim())))
}

/// Re-validate every stored user record
///
/// Returns the number of records checked. The first bad record is reported
/// by its position in registration order.
pub async fn verify_db_integrity(pool: &SqlitePool) -> Result<usize> {
    let rows = sqlx::query(
        "SELECT name, email, password_hash, role FROM users ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    for (index, row) in rows.iter().enumerate() {
        let name: String = row.get("name");
        let email: String = row.get("email");
        let hash: String = row.get("password_hash");
        let role: String = row.get("role");

        let check = validate_name(&name)
            .and_then(|_| validate_email(&email))
            .and_then(|_| check_password_hash(&hash))
            .and_then(|_| role.parse::<Role>().map(|_| ()));

        if let Err(e) = check {
            return Err(Error::Internal(format!(
                "Data integrity issue with user at index {}: {}",
                index,
                e.message()
            )));
        }
    }

    Ok(rows.len())
}
