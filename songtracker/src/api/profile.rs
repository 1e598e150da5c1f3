//! Profile and song list endpoints
//!
//! All routes here act on the logged-in user's own account.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use songtracker_common::db::{ListKind, ListedSong, Role, SongEntry, User, UserUpdate};
use sqlx::SqlitePool;
use tracing::info;

use super::session::{clear_session_cookie, CurrentUser};
use crate::db::{songs, users, ListChange};
use crate::error::ApiJson;
use crate::{ApiResult, AppState};

/// A user's profile as shown to a viewer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: i64,
    pub title: String,
    pub name: String,
    /// Only present for the owner and administrators
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    pub tracked_songs: Vec<ListedSong>,
    pub completed_songs: Vec<ListedSong>,
}

/// Build the profile of `user` as seen by `viewer`
pub async fn load_profile(
    pool: &SqlitePool,
    user: &User,
    viewer: Option<&User>,
) -> ApiResult<ProfileView> {
    let own = viewer.is_some_and(|v| v.id == user.id);
    let privileged = own || viewer.is_some_and(User::is_admin);

    let title = if own {
        "My Profile".to_string()
    } else {
        format!("{}'s Profile", user.name)
    };

    Ok(ProfileView {
        id: user.id,
        title,
        name: user.name.clone(),
        email: privileged.then(|| user.email.clone()),
        role: user.role,
        tracked_songs: songs::list_songs(pool, user.id, ListKind::Tracked).await?,
        completed_songs: songs::list_songs(pool, user.id, ListKind::Completed).await?,
    })
}

/// Response to a list change
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub message: String,
}

impl ListResponse {
    fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

/// GET /profile
pub async fn get_profile(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<ProfileView>> {
    let profile = load_profile(&state.db, &current.user, Some(&current.user)).await?;
    Ok(Json(profile))
}

/// PATCH /profile
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(update): ApiJson<UserUpdate>,
) -> ApiResult<Json<ProfileView>> {
    let user = users::update_user(&state.db, current.user.id, &update).await?;
    let profile = load_profile(&state.db, &user, Some(&user)).await?;
    Ok(Json(profile))
}

/// DELETE /profile
///
/// Removes the account, its lists and every session; clears the cookie.
pub async fn delete_profile(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    users::delete_user(&state.db, current.user.id).await?;
    info!(user_id = current.user.id, "User deleted own account");

    Ok((
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            clear_session_cookie(state.settings.secure_cookies),
        )],
        Json(json!({ "message": "Your account has been deleted" })),
    ))
}

async fn add_song(
    state: &AppState,
    current: &CurrentUser,
    kind: ListKind,
    song: &SongEntry,
) -> ApiResult<Json<ListResponse>> {
    let change: ListChange = songs::add_to_list(&state.db, current.user.id, kind, song).await?;
    Ok(ListResponse::ok(change.message(kind)))
}

/// POST /profile/tracked
pub async fn track_song(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(song): ApiJson<SongEntry>,
) -> ApiResult<Json<ListResponse>> {
    add_song(&state, &current, ListKind::Tracked, &song).await
}

/// POST /profile/completed
pub async fn complete_song(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(song): ApiJson<SongEntry>,
) -> ApiResult<Json<ListResponse>> {
    add_song(&state, &current, ListKind::Completed, &song).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MoveRequest {
    pub song_id: String,
    /// Accepted for compatibility; the stored name is kept
    #[serde(default)]
    pub song_name: Option<String>,
}

/// POST /profile/move-to-completed
pub async fn move_to_completed(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<MoveRequest>,
) -> ApiResult<Json<ListResponse>> {
    let song = songs::move_to_completed(&state.db, current.user.id, &req.song_id).await?;
    Ok(ListResponse::ok(format!(
        "\"{}\" moved to your completed list",
        song.song_name
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemoveRequest {
    pub song_id: String,
    pub list_type: ListKind,
}

/// POST /profile/remove-song
pub async fn remove_song(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<RemoveRequest>,
) -> ApiResult<Json<ListResponse>> {
    songs::remove_song(&state.db, current.user.id, req.list_type, &req.song_id).await?;
    Ok(ListResponse::ok(format!(
        "Song removed from your {} list",
        req.list_type
    )))
}
