use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Key, PrivateCookieJar};

use crate::auth::models::Session;
use crate::auth::session::SESSION_COOKIE;
use crate::error::AppError;
use crate::state::AppState;

/// Extractor for API routes that need a signed-in admin.
///
/// Rejects with `AppError::Auth` (HTTP 401) when there is no valid session.
pub struct CurrentUser(pub Session);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::<Key>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Auth("Not logged in".into()))?;
        state.sessions.current_user(&jar).map(CurrentUser)
    }
}

/// Clear the session cookie whenever an API call ends in 401, so a token the
/// git host revoked stops counting as a login on the very next request.
pub async fn clear_session_on_unauthorized(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if response.status() == StatusCode::UNAUTHORIZED && jar.get(SESSION_COOKIE).is_some() {
        tracing::info!("Dropping session after unauthorized response");
        return (state.sessions.logout(jar), response).into_response();
    }
    response
}
