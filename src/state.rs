use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use crate::admin::AdminShell;
use crate::auth::session::{derive_key, SessionBridge};
use crate::auth::IdentityProvider;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::resolver::ContentResolver;
use crate::store::ContentStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Resolver over the service store (public reads).
    pub resolver: ContentResolver,
    pub sessions: Arc<SessionBridge>,
    pub cookie_key: Key,
    pub admin: Arc<AdminShell>,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ContentStore>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, AppError> {
        let sessions = SessionBridge::new(provider, config.session.ttl_secs, config.session.secure);
        let admin = AdminShell::new(config.admin_base())?;
        Ok(Self {
            cookie_key: derive_key(&config.session.secret),
            resolver: ContentResolver::new(store),
            sessions: Arc::new(sessions),
            admin: Arc::new(admin),
            config: Arc::new(config),
        })
    }
}
