//! Session cookie handling and access-control extractors
//!
//! `session_layer` turns the session cookie into a [`CurrentUser`] request
//! extension. Handlers then declare what they need by taking one of:
//! - [`CurrentUser`]: must be logged in (401 otherwise)
//! - [`AdminUser`]: must be logged in as admin (403 otherwise)
//! - [`Guest`]: must NOT be logged in (400 otherwise)
//! - [`MaybeUser`]: either

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use songtracker_common::db::User;
use std::time::Duration;
use tracing::debug;

use crate::db::sessions;
use crate::{ApiError, AppState};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "songtracker_session";

/// The logged-in user and the session token that identified them
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub token: String,
    pub user: User,
}

/// Resolve the session cookie, if any, into a [`CurrentUser`] extension
///
/// Unknown or expired tokens are treated as anonymous requests.
pub async fn session_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = session_token(request.headers()) {
        match sessions::lookup_session(&state.db, &token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(CurrentUser { token, user });
            }
            Ok(None) => debug!("Ignoring unknown or expired session cookie"),
            Err(e) => return ApiError::from(e).into_response(),
        }
    }

    next.run(request).await
}

/// Extract the session token from `Cookie` headers
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value establishing a session
pub fn session_cookie(token: &str, ttl: Duration, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE,
        token,
        ttl.as_secs(),
        if secure { "; Secure" } else { "" }
    )
}

/// `Set-Cookie` value removing the session cookie
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", Duration::ZERO, secure)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CurrentUser>().cloned().ok_or_else(|| {
            ApiError::Unauthorized("You must be logged in to access this page.".to_string())
        })
    }
}

/// Optional login; never rejects
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<CurrentUser>().cloned()))
    }
}

/// Logged-in administrator
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if !current.user.is_admin() {
            return Err(ApiError::Forbidden(
                "You do not have permission to access this page.".to_string(),
            ));
        }
        Ok(AdminUser(current))
    }
}

/// Anonymous caller (registration and login)
#[derive(Debug, Clone, Copy)]
pub struct Guest;

#[async_trait]
impl<S> FromRequestParts<S> for Guest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if parts.extensions.get::<CurrentUser>().is_some() {
            return Err(ApiError::BadRequest("You are already logged in.".to_string()));
        }
        Ok(Guest)
    }
}
