//! Router configuration for the document viewer.
//!
//! # Route Structure
//!
//! ```text
//! /health                                  GET     health check
//! /documents/{id}/info                     GET     document metadata
//! /documents/{id}/pages                    GET     render, list pages
//! /documents/{id}/pages/{n}                GET     page content
//! /documents/{id}/resources/{name}         GET     page resource
//! /documents/{id}/rotate                   POST    rotate a page
//! /documents/{id}/reorder                  POST    move a page
//! /documents/{id}/cache                    DELETE  evict one document
//! /cache                                   DELETE  evict everything
//! ```
//!
//! Document identifiers containing `/` must be percent-encoded.
//!
//! # Example
//!
//! ```ignore
//! let viewer = ViewerService::new(LocalDocumentSource::new("docs"), license);
//! let router = create_router(viewer, RouterConfig::new());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    routing::{delete, get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    clear_cache_handler, clear_document_cache_handler, health_handler, info_handler, page_handler,
    pages_handler, reorder_handler, resource_handler, rotate_handler, AppState,
};
use crate::service::ViewerService;
use crate::storage::DocumentSource;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Any CORS origin, one hour max-age, tracing enabled.
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 3600,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// An empty vec disallows all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router over `viewer`.
pub fn create_router<S>(viewer: ViewerService<S>, config: RouterConfig) -> Router
where
    S: DocumentSource + 'static,
{
    let app_state = AppState::with_cache_max_age(viewer, config.cache_max_age);
    let cors = build_cors_layer(&config);

    let documents = Router::new()
        .route("/{id}/info", get(info_handler::<S>))
        .route("/{id}/pages", get(pages_handler::<S>))
        .route("/{id}/pages/{n}", get(page_handler::<S>))
        .route("/{id}/resources/{name}", get(resource_handler::<S>))
        .route("/{id}/rotate", post(rotate_handler::<S>))
        .route("/{id}/reorder", post(reorder_handler::<S>))
        .route("/{id}/cache", delete(clear_document_cache_handler::<S>));

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/cache", delete(clear_cache_handler::<S>))
        .nest("/documents", documents)
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
