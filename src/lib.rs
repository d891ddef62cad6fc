pub mod article;
pub mod articles;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod memory;
pub mod revalidate;
pub mod seed;
pub mod upload;

use std::{sync::Arc, time::Duration};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::auth::SessionService;
use crate::config::Config;
use crate::database::{ArticleStore, MySqlStore};
use crate::error::AppResult;
use crate::memory::MemoryStore;
use crate::revalidate::Revalidator;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ArticleStore>,
    pub config: Arc<Config>,
    pub sessions: SessionService,
    pub revalidator: Revalidator,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ArticleStore>) -> Self {
        let sessions = SessionService::new(&config.session_key, config.session_ttl_minutes);
        Self {
            store,
            config: Arc::new(config),
            sessions,
            revalidator: Revalidator::default(),
        }
    }
}

/// MySQL when `DB_URL` is set, otherwise the in-memory store.
pub async fn open_store(config: &Config) -> AppResult<Arc<dyn ArticleStore>> {
    match &config.db_url {
        Some(url) => Ok(Arc::new(MySqlStore::connect(url).await?)),
        None => {
            tracing::warn!("DB_URL not set; articles are kept in memory and lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub fn app(state: AppState) -> Router {
    let guard = middleware::from_fn_with_state(state.clone(), auth::require_admin);
    let upload_limit = DefaultBodyLimit::max(state.config.upload_max_bytes);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(86400));

    let mut router = Router::new()
        .route("/api/healthcheck", get(health::health_check_handler))
        .route(
            "/api/articles",
            get(articles::list_articles)
                .merge(post(articles::create_article).route_layer(guard.clone())),
        )
        .route(
            "/api/articles/:slug",
            get(articles::get_article).merge(
                put(articles::update_article)
                    .delete(articles::delete_article)
                    .route_layer(guard.clone()),
            ),
        )
        .route("/api/auth", post(auth::login))
        .route("/api/admin/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route(
            "/api/upload",
            post(upload::upload)
                .layer(upload_limit.clone())
                .route_layer(guard.clone()),
        )
        .route(
            "/api/upload/base64",
            post(upload::upload_base64)
                .layer(upload_limit)
                .route_layer(guard.clone()),
        )
        .route("/api/seed", post(seed::seed_handler).route_layer(guard));

    let prefix = state.config.upload_url_prefix.clone();
    if prefix.starts_with('/') && prefix.len() > 1 {
        router = router.nest_service(&prefix, ServeDir::new(&state.config.upload_dir));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 24 hex chars, the same shape as a document id.
pub fn generate_object_id() -> String {
    let uuid = Uuid::new_v4();
    let hex = uuid.as_simple().to_string();
    hex[..24].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_are_24_hex_chars() {
        let id = generate_object_id();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_object_id());
    }
}
