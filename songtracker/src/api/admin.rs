//! Administrative endpoints: backups, integrity, session cleanup

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use super::session::AdminUser;
use crate::backup::{self, BackupInfo, RestoreSummary};
use crate::db::{sessions, users};
use crate::{ApiError, ApiResult, AppState};

/// GET /admin/backups
pub async fn list_backups(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<BackupInfo>>> {
    Ok(Json(backup::list_backups(&state.settings.backup_dir).await?))
}

/// POST /admin/backups
pub async fn create_backup(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> ApiResult<(StatusCode, Json<BackupInfo>)> {
    let info = backup::create_backup(&state.db, &state.settings.backup_dir).await?;
    backup::cleanup_old_backups(
        &state.settings.backup_dir,
        state.settings.backup_max_age,
        info.timestamp,
    )
    .await?;
    info!(admin_id = admin.user.id, timestamp = info.timestamp, "Manual backup created");

    Ok((StatusCode::CREATED, Json(info)))
}

/// POST /admin/backups/:timestamp/restore
///
/// Replaces every user, list and session with the snapshot's contents, so
/// the calling admin's session only survives if it is in the snapshot.
pub async fn restore_backup(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(timestamp): Path<String>,
) -> ApiResult<Json<RestoreSummary>> {
    let timestamp: i64 = timestamp
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid backup timestamp: {}", timestamp)))?;

    let summary = backup::restore_backup(&state.db, &state.settings.backup_dir, timestamp).await?;
    info!(admin_id = admin.user.id, timestamp, "Backup restored");

    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
pub struct IntegrityReport {
    pub status: &'static str,
    pub users_checked: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET /admin/integrity
///
/// A failed check is a successful request: the report says what is wrong.
pub async fn check_integrity(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<IntegrityReport>> {
    let report = match users::verify_db_integrity(&state.db).await {
        Ok(count) => IntegrityReport {
            status: "ok",
            users_checked: count,
            message: None,
        },
        Err(songtracker_common::Error::Internal(message)) => {
            error!("{}", message);
            IntegrityReport {
                status: "failed",
                users_checked: 0,
                message: Some(message),
            }
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Json(report))
}

/// DELETE /admin/sessions/expired
pub async fn purge_sessions(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Value>> {
    let purged = sessions::purge_expired_sessions(&state.db).await?;
    Ok(Json(json!({ "purged": purged })))
}
