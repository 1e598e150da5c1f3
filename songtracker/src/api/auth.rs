//! Registration, login and logout
//!
//! Successful registration or login opens a server-side session and hands
//! its token to the client in the session cookie.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use songtracker_common::db::{get_setting, NewUser, User};
use songtracker_common::password::verify_password_blocking;
use tracing::{info, warn};

use super::profile::load_profile;
use super::session::{clear_session_cookie, session_cookie, Guest, MaybeUser};
use crate::db::{sessions, users};
use crate::error::ApiJson;
use crate::{ApiError, ApiResult, AppState};

/// Settings key gating `/register`
pub const REGISTRATION_OPEN_KEY: &str = "registration_open";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Open a session for `user` and build the response carrying its cookie
async fn start_session(
    state: &AppState,
    user: &User,
    status: StatusCode,
    message: &str,
) -> ApiResult<impl IntoResponse> {
    let token = sessions::create_session(&state.db, user.id, state.settings.session_ttl).await?;
    let cookie = session_cookie(
        &token,
        state.settings.session_ttl,
        state.settings.secure_cookies,
    );
    let profile = load_profile(&state.db, user, Some(user)).await?;

    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "message": message,
            "user": profile,
        })),
    ))
}

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    _guest: Guest,
    ApiJson(new_user): ApiJson<NewUser>,
) -> ApiResult<impl IntoResponse> {
    let open = get_setting(&state.db, REGISTRATION_OPEN_KEY).await?;
    if open.as_deref() == Some("false") {
        return Err(ApiError::Forbidden("Registration is closed".to_string()));
    }

    let user = users::create_user(&state.db, &new_user).await?;

    start_session(&state, &user, StatusCode::CREATED, "Registration successful").await
}

/// POST /login
///
/// Unknown email and wrong password produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    _guest: Guest,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = users::find_user_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password_blocking(req.password, user.password_hash.clone()).await {
        warn!(user_id = user.id, "Failed login attempt");
        return Err(invalid());
    }

    info!(user_id = user.id, "User logged in");
    start_session(&state, &user, StatusCode::OK, "Login successful").await
}

/// POST /logout
pub async fn logout(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
) -> ApiResult<impl IntoResponse> {
    let current = current.ok_or_else(|| ApiError::BadRequest("No active session".to_string()))?;

    sessions::delete_session(&state.db, &current.token).await?;
    info!(user_id = current.user.id, "User logged out");

    Ok((
        [(
            header::SET_COOKIE,
            clear_session_cookie(state.settings.secure_cookies),
        )],
        Json(json!({ "message": "Logged out" })),
    ))
}
