use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use chrono::{Duration, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha512};

use crate::auth::models::Session;
use crate::auth::IdentityProvider;
use crate::error::AppError;

/// Cookie holding the encrypted, authenticated session.
pub const SESSION_COOKIE: &str = "outstatic_session";
/// Cookie remembering the OAuth `state` between login and callback.
pub const STATE_COOKIE: &str = "outstatic_oauth_state";

const STATE_LEN: usize = 32;
const STATE_TTL_SECS: i64 = 10 * 60;

/// Derive the cookie key from the configured secret.
pub fn derive_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// Owns login, logout and "who is signed in" for the admin.
///
/// The session lives entirely in a private cookie; nothing is kept server-side.
pub struct SessionBridge {
    provider: Arc<dyn IdentityProvider>,
    ttl: Duration,
    secure: bool,
}

impl SessionBridge {
    pub fn new(provider: Arc<dyn IdentityProvider>, ttl_secs: i64, secure: bool) -> Self {
        Self {
            provider,
            ttl: Duration::seconds(ttl_secs),
            secure,
        }
    }

    /// Start the OAuth flow: remember a fresh `state` and return the URL to redirect to.
    pub fn initiate_login(&self, jar: PrivateCookieJar) -> (PrivateCookieJar, String) {
        let state: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_LEN)
            .map(char::from)
            .collect();

        let cookie = Cookie::build((STATE_COOKIE, state.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(time::Duration::seconds(STATE_TTL_SECS));

        let url = self.provider.authorize_url(&state);
        (jar.add(cookie), url)
    }

    /// Finish the OAuth flow. On success the returned jar carries the session
    /// cookie; on any failure no session is created.
    pub async fn complete_login(
        &self,
        jar: PrivateCookieJar,
        code: &str,
        state: Option<&str>,
    ) -> Result<(PrivateCookieJar, Session), AppError> {
        let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
        match (expected.as_deref(), state) {
            (Some(expected), Some(got)) if expected == got => {}
            _ => return Err(AppError::Auth("Invalid OAuth state".into())),
        }
        if code.is_empty() {
            return Err(AppError::Auth("Missing authorization code".into()));
        }

        let access_token = self.provider.exchange_code(code).await?;
        let user = self.provider.fetch_user(&access_token).await?;

        let session = Session {
            user,
            access_token,
            expires_at: Utc::now() + self.ttl,
        };
        let value = serde_json::to_string(&session)
            .map_err(|e| AppError::Internal(format!("Failed to serialize session: {e}")))?;

        let cookie = Cookie::build((SESSION_COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(time::Duration::seconds(self.ttl.num_seconds()));

        let jar = jar.remove(removal(STATE_COOKIE)).add(cookie);
        tracing::info!(login = %session.user.login, "Admin session established");
        Ok((jar, session))
    }

    /// Read the current session. Missing, tampered, malformed and expired
    /// cookies all mean "unauthenticated".
    pub fn current_user(&self, jar: &PrivateCookieJar) -> Result<Session, AppError> {
        let cookie = jar
            .get(SESSION_COOKIE)
            .ok_or_else(|| AppError::Auth("Not logged in".into()))?;

        let session: Session = serde_json::from_str(cookie.value())
            .map_err(|e| AppError::Auth(format!("Invalid session: {e}")))?;

        if session.is_expired_at(Utc::now()) {
            return Err(AppError::Auth("Session expired".into()));
        }
        Ok(session)
    }

    /// Drop the session cookie.
    pub fn logout(&self, jar: PrivateCookieJar) -> PrivateCookieJar {
        jar.remove(removal(SESSION_COOKIE))
    }
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").removal().build()
}
