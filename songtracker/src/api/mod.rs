//! HTTP API handlers for songtracker

pub mod admin;
pub mod auth;
pub mod health;
pub mod profile;
pub mod session;
pub mod users;

pub use admin::{check_integrity, create_backup, list_backups, purge_sessions, restore_backup};
pub use auth::{login, logout, register};
pub use health::health_routes;
pub use profile::{
    complete_song, delete_profile, get_profile, move_to_completed, remove_song, track_song,
    update_profile,
};
pub use session::{session_layer, AdminUser, CurrentUser, Guest, MaybeUser};
pub use users::{delete_user, get_user_profile, list_users};

use crate::ApiError;

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Page not found".to_string())
}
