//! HTTP server layer over [`ViewerService`](crate::service::ViewerService).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │            GET /documents/{id}/pages/{n}?format=png             │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (requests, error mapping)│  │  (router, CORS, tracing)    │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    clear_cache_handler, clear_document_cache_handler, health_handler, info_handler, page_handler,
    pages_handler, reorder_handler, resource_handler, rotate_handler, AppState,
    ClearCacheResponse, ErrorResponse, HealthResponse, PageSummary, PagesResponse, RenderQuery,
    ReorderRequest, RotateRequest,
};
pub use routes::{create_router, RouterConfig};
