use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::admin::{admin_index, admin_page};
use crate::api::auth::{callback_handler, login_handler, logout_handler, user_handler};
use crate::api::content::{
    create_document_handler, delete_collection_handler, delete_document_handler,
    get_collection_handler, get_document_handler, list_collections_handler,
    list_documents_handler, public_collection_handler, public_document_handler,
    put_collection_handler, put_document_handler,
};
use crate::api::upload::upload_media_handler;
use crate::auth::middleware::clear_session_on_unauthorized;
use crate::config::API_PREFIX;
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Every route the CMS serves: the API under `/api/outstatic` and the admin
/// shell under the configured base path.
pub fn router(state: AppState) -> Router {
    let admin_base = state.config.admin_base().to_string();

    let admin_api = Router::new()
        .route("/collections", get(list_collections_handler))
        .route(
            "/collections/{collection}",
            get(get_collection_handler)
                .put(put_collection_handler)
                .delete(delete_collection_handler),
        )
        .route(
            "/collections/{collection}/documents",
            get(list_documents_handler).post(create_document_handler),
        )
        .route(
            "/collections/{collection}/documents/{slug}",
            get(get_document_handler)
                .put(put_document_handler)
                .delete(delete_document_handler),
        )
        .route(
            "/media",
            post(upload_media_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            clear_session_on_unauthorized,
        ));

    let api = Router::new()
        .route("/auth/login", get(login_handler))
        .route("/auth/callback", get(callback_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/user", get(user_handler))
        .route("/content/{collection}", get(public_collection_handler))
        .route("/content/{collection}/{slug}", get(public_document_handler))
        .merge(admin_api);

    Router::new()
        .nest(API_PREFIX, api)
        .route(&admin_base, get(admin_index))
        .route(&format!("{admin_base}/{{*path}}"), get(admin_page))
        .with_state(state)
}
