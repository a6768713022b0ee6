use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use outstatic::auth::config::OAuthConfig;
use outstatic::auth::github::GitHubOAuth;
use outstatic::config::{AppConfig, StoreMode};
use outstatic::state::AppState;
use outstatic::store::github::GitHubStore;
use outstatic::store::local::LocalStore;
use outstatic::store::{ContentLayout, ContentStore};

/// Git-backed CMS content API and admin UI.
#[derive(Debug, Parser)]
#[command(name = "outstatic", version)]
struct Args {
    /// Configuration file (defaults to `outstatic.toml` when present).
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Listen address, overriding `server.addr`.
    #[arg(long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "outstatic=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let addr = args.addr.unwrap_or_else(|| config.server.addr.clone());

    tracing::info!("Starting Outstatic in {:?} mode...", config.mode);

    let layout = ContentLayout::from_config(&config.content);
    let media_dir = config.content.local_root.join(&layout.media_path);
    let media_url = layout.media_url.clone();

    let store: Arc<dyn ContentStore> = match config.mode {
        StoreMode::Local => {
            tracing::info!(root = %config.content.local_root.display(), "Using local content store");
            Arc::new(LocalStore::new(config.content.local_root.clone(), layout))
        }
        StoreMode::Remote => {
            if config.github.token.is_none() {
                tracing::warn!(
                    "github.token is not set: public content reads will fail in remote mode"
                );
            }
            tracing::info!(
                repository = %format!("{}/{}", config.github.owner, config.github.repo),
                branch = %config.github.branch,
                "Using GitHub content store"
            );
            Arc::new(GitHubStore::new(&config.github, layout).context("Failed to build GitHub client")?)
        }
    };

    let provider = Arc::new(
        GitHubOAuth::new(OAuthConfig::from_github(&config.github))
            .context("Failed to build OAuth client")?,
    );

    let mode = config.mode;
    let state = AppState::new(config, store, provider).context("Failed to build application state")?;

    let mut app = outstatic::router::router(state);
    if mode == StoreMode::Local && !media_url.is_empty() {
        // Remote mode leaves media serving to the host site's build.
        app = app.nest_service(&media_url, ServeDir::new(media_dir));
    }
    let app = app.layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
