use async_trait::async_trait;
use serde::Deserialize;
use url::form_urlencoded::byte_serialize;

use crate::auth::config::{OAuthConfig, SCOPES};
use crate::auth::models::{AccessToken, SessionUser};
use crate::auth::IdentityProvider;
use crate::error::AppError;
use crate::http_client::{build_client, is_rate_limited, status_error, transport_error};

/// GitHub OAuth app client.
pub struct GitHubOAuth {
    http: reqwest::Client,
    config: OAuthConfig,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl GitHubOAuth {
    pub fn new(config: OAuthConfig) -> Result<Self, AppError> {
        Ok(Self {
            http: build_client()?,
            config,
        })
    }
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

#[async_trait]
impl IdentityProvider for GitHubOAuth {
    fn authorize_url(&self, state: &str) -> String {
        let mut url = format!(
            "{}?client_id={}&scope={}&response_type=code&state={}",
            self.config.authorize_url,
            encode(&self.config.client_id),
            SCOPES.join(","),
            encode(state),
        );
        if let Some(redirect) = &self.config.redirect_uri {
            url.push_str("&redirect_uri=");
            url.push_str(&encode(redirect));
        }
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<AccessToken, AppError> {
        let mut form = vec![
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
        ];
        if let Some(redirect) = &self.config.redirect_uri {
            form.push(("redirect_uri", redirect.as_str()));
        }

        let response = self
            .http
            .post(&self.config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error("OAuth token exchange", e))?;

        let status = response.status();
        if !status.is_success() {
            let err = status_error("OAuth token exchange", status, is_rate_limited(response.headers()));
            return Err(match err {
                AppError::Transient(_) => err,
                other => AppError::Auth(other.to_string()),
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("Malformed token response: {e}")))?;

        match body {
            TokenResponse {
                access_token: Some(token),
                ..
            } if !token.is_empty() => Ok(AccessToken::new(token)),
            TokenResponse {
                error,
                error_description,
                ..
            } => {
                let reason = error_description
                    .or(error)
                    .unwrap_or_else(|| "no access token returned".to_string());
                tracing::warn!("OAuth code exchange rejected: {reason}");
                Err(AppError::Auth(format!("Login failed: {reason}")))
            }
        }
    }

    async fn fetch_user(&self, token: &AccessToken) -> Result<SessionUser, AppError> {
        let response = self
            .http
            .get(&self.config.user_url)
            .bearer_auth(token.secret())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| transport_error("Fetching GitHub user", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(
                "Fetching GitHub user",
                status,
                is_rate_limited(response.headers()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Malformed user response: {e}")))
    }
}
