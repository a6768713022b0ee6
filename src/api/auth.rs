use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect};
use axum::Json;
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;

use crate::auth::middleware::CurrentUser;
use crate::auth::models::SessionUser;
use crate::error::AppError;
use crate::state::AppState;

/// Query string GitHub appends to the callback URL.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// `302 Found` to `location`. Browsers and OAuth providers expect a plain
/// temporary redirect on the way into the login flow.
pub fn redirect_found(location: &str) -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())])
}

/// Axum handler for `GET /api/outstatic/auth/login`.
///
/// Redirects the browser to the OAuth authorization page.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> impl IntoResponse {
    let (jar, url) = state.sessions.initiate_login(jar);
    (jar, redirect_found(&url))
}

/// Axum handler for `GET /api/outstatic/auth/callback`.
///
/// Completes the login and sends the user to the admin UI.
pub async fn callback_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(error) = params.error {
        let reason = params.error_description.unwrap_or(error);
        tracing::warn!("OAuth authorization was not granted: {reason}");
        return Err(AppError::Auth(format!("Login failed: {reason}")));
    }
    let code = params.code.unwrap_or_default();
    let (jar, _session) = state
        .sessions
        .complete_login(jar, &code, params.state.as_deref())
        .await?;
    Ok((jar, Redirect::to(state.config.admin_base())))
}

/// Axum handler for `POST /api/outstatic/auth/logout`.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> impl IntoResponse {
    (state.sessions.logout(jar), Redirect::to("/"))
}

/// Axum handler for `GET /api/outstatic/auth/user`.
pub async fn user_handler(CurrentUser(session): CurrentUser) -> Json<SessionUser> {
    Json(session.user)
}
