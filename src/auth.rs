//! Session bridge between the browser and the git host's OAuth flow.

pub mod config;
pub mod github;
pub mod middleware;
pub mod models;
pub mod session;

use async_trait::async_trait;

use crate::auth::models::{AccessToken, SessionUser};
use crate::error::AppError;

/// The OAuth side of login: where to send the browser, how to turn the
/// returned code into a token, and who that token belongs to.
///
/// Abstracted as a trait so tests can log in without a real git host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL of the authorization page, carrying `state` for CSRF protection.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<AccessToken, AppError>;

    /// Look up the user the token was issued to.
    async fn fetch_user(&self, token: &AccessToken) -> Result<SessionUser, AppError>;
}
