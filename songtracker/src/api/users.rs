//! User directory endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use songtracker_common::db::UserSummary;
use tracing::info;

use super::profile::{load_profile, ProfileView};
use super::session::{AdminUser, MaybeUser};
use crate::db::users;
use crate::{ApiError, ApiResult, AppState};

fn parse_user_id(raw: &str) -> ApiResult<i64> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid user id: {}", raw)))
}

/// GET /users (admin)
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<UserSummary>>> {
    Ok(Json(users::list_users(&state.db).await?))
}

/// GET /users/:id
///
/// Public; the email is only included for the owner and administrators.
pub async fn get_user_profile(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ProfileView>> {
    let id = parse_user_id(&id)?;
    let user = users::get_user(&state.db, id).await?;
    let viewer = viewer.map(|v| v.user);

    Ok(Json(load_profile(&state.db, &user, viewer.as_ref()).await?))
}

/// DELETE /users/:id (admin)
///
/// Administrators remove their own account through `DELETE /profile`.
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_user_id(&id)?;
    if id == admin.user.id {
        return Err(ApiError::BadRequest(
            "Use your profile to delete your own account".to_string(),
        ));
    }

    users::delete_user(&state.db, id).await?;
    info!(user_id = id, admin_id = admin.user.id, "Administrator deleted user");

    Ok(Json(json!({ "message": format!("User {} deleted", id) })))
}
