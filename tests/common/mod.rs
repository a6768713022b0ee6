#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use tempfile::TempDir;

use outstatic::auth::models::{AccessToken, SessionUser};
use outstatic::auth::IdentityProvider;
use outstatic::config::{
    AdminConfig, AppConfig, ContentConfig, GitHubConfig, ServerConfig, SessionConfig, StoreMode,
};
use outstatic::error::AppError;
use outstatic::state::AppState;
use outstatic::store::github::GitHubStore;
use outstatic::store::local::LocalStore;
use outstatic::store::{ContentLayout, ContentStore};

/// The only authorization code the stub provider accepts.
pub const VALID_CODE: &str = "abc123";

/// Stands in for GitHub's OAuth endpoints.
pub struct StubProvider;

#[async_trait]
impl IdentityProvider for StubProvider {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://github.test/login/oauth/authorize?client_id=client-123&scope=repo,user&response_type=code&state={state}")
    }

    async fn exchange_code(&self, code: &str) -> Result<AccessToken, AppError> {
        if code == VALID_CODE {
            Ok(AccessToken::new("gho_test_token"))
        } else {
            Err(AppError::Auth("bad_verification_code".into()))
        }
    }

    async fn fetch_user(&self, _token: &AccessToken) -> Result<SessionUser, AppError> {
        Ok(SessionUser {
            login: "octocat".into(),
            name: Some("The Octocat".into()),
            email: Some("octocat@example.com".into()),
            avatar_url: None,
        })
    }
}

/// A full application over a temporary working tree.
///
/// The directory is removed when this struct is dropped.
pub struct TestEnv {
    _dir: TempDir,
    pub root: PathBuf,
    pub router: Router,
}

impl TestEnv {
    pub fn start() -> Self {
        Self::build(None)
    }

    /// An application whose content lives behind the GitHub GraphQL API at
    /// `graphql_url`.
    pub fn with_github(graphql_url: &str) -> Self {
        Self::build(Some(graphql_url))
    }

    fn build(graphql_url: Option<&str>) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dir.path().to_path_buf();
        let mut config = config(&root);
        let layout = ContentLayout::from_config(&config.content);

        let store: Arc<dyn ContentStore> = match graphql_url {
            Some(url) => {
                config.mode = StoreMode::Remote;
                config.github.graphql_url = url.to_string();
                Arc::new(GitHubStore::new(&config.github, layout).expect("Failed to build GitHubStore"))
            }
            None => Arc::new(LocalStore::new(root.clone(), layout)),
        };
        let state = AppState::new(config, store, Arc::new(StubProvider))
            .expect("Failed to build AppState");

        Self {
            _dir: dir,
            root,
            router: outstatic::router::router(state),
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    ///
    /// Success is not expected by default: redirects and error statuses are
    /// asserted explicitly by each test.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .save_cookies()
            .build(self.router.clone())
    }

    /// Helper: write a file into the working tree.
    pub async fn write_file(&self, relative: &str, text: &str) {
        let path = self.root.join(relative);
        tokio::fs::create_dir_all(path.parent().expect("file has a parent"))
            .await
            .expect("Failed to create directories");
        tokio::fs::write(path, text)
            .await
            .expect("Failed to write file");
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.root.join(relative).exists()
    }
}

/// Helper: run the OAuth round trip so the server's cookie jar holds a session.
pub async fn login(server: &axum_test::TestServer) {
    let response = server.get("/api/outstatic/auth/login").await;
    response.assert_status(axum::http::StatusCode::FOUND);
    let state = state_param(&location(&response));

    let response = server
        .get("/api/outstatic/auth/callback")
        .add_query_param("code", VALID_CODE)
        .add_query_param("state", &state)
        .await;
    response.assert_status(axum::http::StatusCode::SEE_OTHER);
}

pub fn location(response: &axum_test::TestResponse) -> String {
    response
        .header("location")
        .to_str()
        .expect("location is ASCII")
        .to_string()
}

/// Extract the `state` query parameter from the authorize URL.
pub fn state_param(url: &str) -> String {
    url.split(['?', '&'])
        .find_map(|pair| pair.strip_prefix("state="))
        .expect("authorize URL carries a state")
        .to_string()
}

/// Helper: create a plain list collection through the API.
pub async fn create_collection(server: &axum_test::TestServer, name: &str) {
    server
        .put(&format!("/api/outstatic/collections/{name}"))
        .json(&serde_json::json!({ "name": name }))
        .await
        .assert_status_ok();
}

fn config(root: &Path) -> AppConfig {
    AppConfig {
        mode: StoreMode::Local,
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
            oauth_url: "https://github.test".into(),
            api_url: "https://api.github.test".into(),
            graphql_url: "https://api.github.test/graphql".into(),
        },
        content: ContentConfig {
            base_path: "outstatic/content".into(),
            media_path: "public/images".into(),
            media_url: "/images".into(),
            local_root: root.to_path_buf(),
        },
        session: SessionConfig {
            secret: "integration-test-secret-that-is-long-enough".into(),
            ttl_secs: 3600,
            secure: false,
        },
    }
}
