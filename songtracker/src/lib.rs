//! songtracker library - HTTP service for personal song lists
//!
//! Users register, log in, and keep a tracked list and a completed list of
//! songs. State lives in SQLite; the legacy flat-file user store can be
//! imported with the `import-json` command.

use axum::Router;
use chrono::{DateTime, Utc};
use songtracker_common::config::{RootFolderInitializer, ServiceConfig};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub mod api;
pub mod backup;
pub mod db;
pub mod error;
pub mod legacy;

pub use crate::error::{ApiError, ApiResult};

/// Runtime settings handlers need, derived from [`ServiceConfig`]
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Lifetime of a login session
    pub session_ttl: Duration,
    /// Add `Secure` to session cookies
    pub secure_cookies: bool,
    /// Where backup snapshots live
    pub backup_dir: PathBuf,
    /// Snapshots older than this are deleted by cleanup
    pub backup_max_age: Duration,
}

impl AppSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        let root = RootFolderInitializer::new(config.root_folder.clone());
        Self {
            session_ttl: Duration::from_secs(config.session_ttl_hours * 60 * 60),
            secure_cookies: config.secure_cookies,
            backup_dir: root.backup_dir(),
            backup_max_age: Duration::from_secs(config.backup_max_age_days * 24 * 60 * 60),
        }
    }

    /// Defaults rooted at `backup_dir`, mainly for tests
    pub fn with_backup_dir(backup_dir: PathBuf) -> Self {
        Self {
            session_ttl: Duration::from_secs(24 * 60 * 60),
            secure_cookies: false,
            backup_dir,
            backup_max_age: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub settings: Arc<AppSettings>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, settings: AppSettings) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// Access rules are enforced by the extractors each handler takes
/// (`CurrentUser`, `AdminUser`, `MaybeUser`); the session layer only
/// resolves the cookie.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{delete, get, post};
    use tower_http::trace::TraceLayer;

    Router::new()
        .merge(api::health_routes())
        .route("/register", post(api::register))
        .route("/login", post(api::login))
        .route("/logout", post(api::logout))
        .route(
            "/profile",
            get(api::get_profile)
                .patch(api::update_profile)
                .delete(api::delete_profile),
        )
        .route("/profile/tracked", post(api::track_song))
        .route("/profile/completed", post(api::complete_song))
        .route("/profile/move-to-completed", post(api::move_to_completed))
        .route("/profile/remove-song", post(api::remove_song))
        .route("/users", get(api::list_users))
        .route("/users/:id", get(api::get_user_profile).delete(api::delete_user))
        .route("/admin/backups", get(api::list_backups).post(api::create_backup))
        .route("/admin/backups/:timestamp/restore", post(api::restore_backup))
        .route("/admin/integrity", get(api::check_integrity))
        .route("/admin/sessions/expired", delete(api::purge_sessions))
        .fallback(api::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::session_layer,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
