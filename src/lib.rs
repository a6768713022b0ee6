pub mod admin;
pub mod api {
    pub mod auth;
    pub mod content;
    pub mod errors;
    pub mod upload;
}
pub mod auth;
pub mod config;
pub mod content {
    pub mod frontmatter;
    pub mod models;
    pub mod schema;
}
pub mod error;
pub mod http_client;
pub mod rendering {
    pub mod markdown;
}
pub mod resolver;
pub mod router;
pub mod state;
pub mod store;
