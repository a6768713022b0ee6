use crate::config::GitHubConfig;

/// Scopes requested from GitHub: repository contents and the user profile.
pub const SCOPES: &[&str] = &["repo", "user"];

/// OAuth application settings, derived from the GitHub section of the app config.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// The OAuth2 client ID.
    pub client_id: String,
    /// The OAuth2 client secret.
    pub client_secret: String,
    /// The redirect URI after login completes, when not left to the app settings.
    pub redirect_uri: Option<String>,
    /// `https://github.com/login/oauth/authorize` or equivalent.
    pub authorize_url: String,
    /// `https://github.com/login/oauth/access_token` or equivalent.
    pub token_url: String,
    /// REST endpoint returning the authenticated user.
    pub user_url: String,
}

impl OAuthConfig {
    pub fn from_github(github: &GitHubConfig) -> Self {
        let oauth = github.oauth_url.trim_end_matches('/');
        let api = github.api_url.trim_end_matches('/');
        Self {
            client_id: github.client_id.clone(),
            client_secret: github.client_secret.clone(),
            redirect_uri: github.redirect_uri.clone(),
            authorize_url: format!("{oauth}/login/oauth/authorize"),
            token_url: format!("{oauth}/login/oauth/access_token"),
            user_url: format!("{api}/user"),
        }
    }

    /// Build with explicit values (useful for testing).
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_uri: Option<String>,
        authorize_url: String,
        token_url: String,
        user_url: String,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            authorize_url,
            token_url,
            user_url,
        }
    }
}
