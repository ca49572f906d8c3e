//! HTTP surface for Shelf: the article list, article submission behind an
//! API key, and a health probe.
use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use shelf_store::ArticleStore;
use shelf_web::PageFetcher;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod auth;
pub mod routes;

pub use error::ApiError;

/// Shared handler state. Cloned per request; everything inside is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: ArticleStore,
    pub fetcher: Arc<dyn PageFetcher>,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(
        store: ArticleStore,
        fetcher: Arc<dyn PageFetcher>,
        api_key: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            store,
            fetcher,
            api_key: api_key.into(),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    // Only the mutating route sits behind the key.
    let submit = axum::routing::post(routes::create_article).route_layer(
        middleware::from_fn_with_state(state.clone(), auth::require_api_key),
    );

    Router::new()
        .route("/api/articles", get(routes::list_articles).merge(submit))
        .route("/health", get(routes::health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
