use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::AppError;

/// Route prefix of every API endpoint exposed by the router.
pub const API_PREFIX: &str = "/api/outstatic";

/// Where content lives: the remote git host or the local working tree.
///
/// Chosen once at startup; the resolver never branches on it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    Remote,
    Local,
}

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub mode: StoreMode,
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub github: GitHubConfig,
    pub content: ContentConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address of the bundled binary.
    pub addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Mount point of the admin UI shell (e.g. `/outstatic`).
    pub base_path: String,
}

/// GitHub OAuth application and repository location.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Explicit OAuth callback URL. GitHub falls back to the app setting when absent.
    pub redirect_uri: Option<String>,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Token used for reads that happen outside an admin session
    /// (public content rendering in remote mode).
    pub token: Option<String>,
    /// Base URL of the OAuth endpoints (`/login/oauth/...`).
    pub oauth_url: String,
    /// Base URL of the REST API (used for `/user`).
    pub api_url: String,
    /// GraphQL endpoint.
    pub graphql_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    /// Repository-relative directory holding one sub-directory per collection.
    pub base_path: String,
    /// Repository-relative directory for uploaded media.
    pub media_path: String,
    /// Public URL prefix under which `media_path` is served.
    pub media_url: String,
    /// Working tree used by the local store.
    pub local_root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Secret the signed cookie key is derived from.
    pub secret: String,
    /// Session lifetime in seconds.
    pub ttl_secs: i64,
    /// Mark cookies `Secure` (disable for plain-http development).
    pub secure: bool,
}

const MIN_SECRET_LEN: usize = 32;

impl AppConfig {
    /// Load configuration from defaults, an optional TOML file and the environment.
    ///
    /// Sources, later ones winning:
    /// - built-in defaults
    /// - `path` (or `outstatic.toml` in the working directory), if present
    /// - `OUTSTATIC__SECTION__KEY` variables (e.g. `OUTSTATIC__GITHUB__OWNER`)
    /// - `OST_GITHUB_ID`, `OST_GITHUB_SECRET`, `OST_TOKEN_SECRET`,
    ///   `OST_REPO_OWNER`, `OST_REPO_SLUG`, `OST_REPO_BRANCH`,
    ///   `OST_CONTENT_PATH`, `OST_GITHUB_TOKEN`
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let file = path
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "outstatic.toml".to_string());

        let config = Config::builder()
            .set_default("mode", "local")?
            .set_default("server.addr", "127.0.0.1:3000")?
            .set_default("admin.base_path", "/outstatic")?
            .set_default("github.client_id", "")?
            .set_default("github.client_secret", "")?
            .set_default("github.owner", "")?
            .set_default("github.repo", "")?
            .set_default("github.branch", "main")?
            .set_default("github.oauth_url", "https://github.com")?
            .set_default("github.api_url", "https://api.github.com")?
            .set_default("github.graphql_url", "https://api.github.com/graphql")?
            .set_default("content.base_path", "outstatic/content")?
            .set_default("content.media_path", "public/images")?
            .set_default("content.media_url", "/images")?
            .set_default("content.local_root", ".")?
            .set_default("session.secret", "")?
            .set_default("session.ttl_secs", 7_i64 * 24 * 60 * 60)?
            .set_default("session.secure", true)?
            .add_source(File::with_name(&file).required(path.is_some()))
            .add_source(
                Environment::with_prefix("OUTSTATIC")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("github.client_id", env_opt("OST_GITHUB_ID"))?
            .set_override_option("github.client_secret", env_opt("OST_GITHUB_SECRET"))?
            .set_override_option("github.token", env_opt("OST_GITHUB_TOKEN"))?
            .set_override_option("github.owner", env_opt("OST_REPO_OWNER"))?
            .set_override_option("github.repo", env_opt("OST_REPO_SLUG"))?
            .set_override_option("github.branch", env_opt("OST_REPO_BRANCH"))?
            .set_override_option("content.base_path", env_opt("OST_CONTENT_PATH"))?
            .set_override_option("session.secret", env_opt("OST_TOKEN_SECRET"))?
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field requirements the deserializer cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.github.client_id.is_empty() || self.github.client_secret.is_empty() {
            return Err(AppError::Config(
                "github.client_id and github.client_secret are required for admin login".into(),
            ));
        }
        if self.session.secret.len() < MIN_SECRET_LEN {
            return Err(AppError::Config(format!(
                "session.secret must be at least {MIN_SECRET_LEN} characters"
            )));
        }
        if self.session.ttl_secs <= 0 {
            return Err(AppError::Config("session.ttl_secs must be positive".into()));
        }
        if !self.admin.base_path.starts_with('/') || self.admin.base_path.len() < 2 {
            return Err(AppError::Config(
                "admin.base_path must be an absolute path such as /outstatic".into(),
            ));
        }
        if self.mode == StoreMode::Remote
            && (self.github.owner.is_empty() || self.github.repo.is_empty())
        {
            return Err(AppError::Config(
                "remote mode needs github.owner and github.repo".into(),
            ));
        }
        Ok(())
    }

    /// Admin base path without a trailing slash.
    pub fn admin_base(&self) -> &str {
        self.admin.base_path.trim_end_matches('/')
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) fn test_config(mode: StoreMode, local_root: PathBuf) -> AppConfig {
    AppConfig {
        mode,
        server: ServerConfig {
            addr: "127.0.0.1:0".into(),
        },
        admin: AdminConfig {
            base_path: "/outstatic".into(),
        },
        github: GitHubConfig {
            client_id: "client-123".into(),
            client_secret: "secret-456".into(),
            redirect_uri: None,
            owner: "acme".into(),
            repo: "site".into(),
            branch: "main".into(),
            token: None,
            oauth_url: "https://github.com".into(),
            api_url: "https://api.github.com".into(),
            graphql_url: "https://api.github.com/graphql".into(),
        },
        content: ContentConfig {
            base_path: "outstatic/content".into(),
            media_path: "public/images".into(),
            media_url: "/images".into(),
            local_root,
        },
        session: SessionConfig {
            secret: "x".repeat(48),
            ttl_secs: 3600,
            secure: false,
        },
    }
}
