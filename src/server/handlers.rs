//! HTTP request handlers for the document viewer API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /documents/{id}/info` - Document metadata
//! - `GET /documents/{id}/pages` - Render and list pages
//! - `GET /documents/{id}/pages/{n}` - Content of one page
//! - `GET /documents/{id}/resources/{name}` - Non-embedded page resource
//! - `POST /documents/{id}/rotate` - Rotate a page
//! - `POST /documents/{id}/reorder` - Move a page
//! - `DELETE /documents/{id}/cache` - Evict one document
//! - `DELETE /cache` - Evict everything

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{StorageError, ViewerError, ViewerResult};
use crate::render::{
    CancellationToken, Color, ImageEncoding, RenderOptions, RenderTarget, RenderedPage, Watermark,
    WatermarkPosition, DEFAULT_JPEG_QUALITY,
};
use crate::service::{DocumentInfo, PageSet, ViewerService};
use crate::storage::DocumentSource;
use crate::transform::Transformations;

const CACHE_HIT_HEADER: HeaderName = HeaderName::from_static("x-cache-hit");

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the viewer service.
pub struct AppState<S: DocumentSource> {
    pub viewer: Arc<ViewerService<S>>,

    /// Cache-Control max-age for page and resource content, in seconds
    pub cache_max_age: u32,
}

impl<S: DocumentSource> AppState<S> {
    pub fn new(viewer: ViewerService<S>) -> Self {
        Self::with_cache_max_age(viewer, 3600)
    }

    pub fn with_cache_max_age(viewer: ViewerService<S>, cache_max_age: u32) -> Self {
        Self {
            viewer: Arc::new(viewer),
            cache_max_age,
        }
    }
}

impl<S: DocumentSource> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            viewer: Arc::clone(&self.viewer),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters describing render options and target.
///
/// `format` selects the target (`html`, `png`, `jpeg`); the server's
/// default target applies when it is omitted.
#[derive(Debug, Default, Deserialize)]
pub struct RenderQuery {
    /// Comma-separated original page numbers
    #[serde(default)]
    pub pages: Option<String>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub start: Option<u32>,
    #[serde(default)]
    pub embed: bool,

    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub quality: Option<u8>,

    #[serde(default)]
    pub watermark: Option<String>,
    #[serde(default)]
    pub watermark_color: Option<String>,
    #[serde(default)]
    pub watermark_position: Option<String>,
    #[serde(default)]
    pub watermark_width: Option<f32>,

    /// `all` (default), `none`, `rotate` or `reorder`
    #[serde(default)]
    pub transforms: Option<String>,

    /// Render this attachment of the document instead
    #[serde(default)]
    pub attachment: Option<String>,
}

fn invalid(message: impl Into<String>) -> ViewerError {
    ViewerError::InvalidOptions(message.into())
}

impl RenderQuery {
    /// Render options described by the query.
    pub fn options(&self) -> ViewerResult<RenderOptions> {
        let mut options = RenderOptions::new().embed_resources(self.embed);

        if let Some(pages) = &self.pages {
            let numbers = pages
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| p.parse::<u32>().map_err(|_| invalid(format!("bad page number `{}`", p))))
                .collect::<ViewerResult<Vec<_>>>()?;
            options = options.with_pages(numbers);
        }
        if let Some(count) = self.count {
            options = options.with_count(count);
        }
        if let Some(start) = self.start {
            options = options.starting_at(start);
        }

        if let Some(text) = &self.watermark {
            let mut watermark = Watermark::new(text.clone());
            if let Some(color) = &self.watermark_color {
                watermark = watermark.with_color(
                    Color::parse(color).ok_or_else(|| invalid(format!("unknown color `{}`", color)))?,
                );
            }
            if let Some(position) = &self.watermark_position {
                watermark = watermark.with_position(
                    WatermarkPosition::parse(position)
                        .ok_or_else(|| invalid(format!("unknown position `{}`", position)))?,
                );
            }
            if let Some(width) = self.watermark_width {
                watermark = watermark.with_width(width);
            }
            options = options.with_watermark(watermark);
        }

        let transformations = match self.transforms.as_deref() {
            None | Some("all") => Transformations::ALL,
            Some("none") => Transformations::NONE,
            Some("rotate") => Transformations {
                rotate: true,
                reorder: false,
            },
            Some("reorder") => Transformations {
                rotate: false,
                reorder: true,
            },
            Some(other) => return Err(invalid(format!("unknown transforms `{}`", other))),
        };

        let options = options.with_transformations(transformations);
        options.validate()?;
        Ok(options)
    }

    /// Render target described by the query, or `default` when no format is given.
    pub fn target(&self, default: RenderTarget) -> ViewerResult<RenderTarget> {
        let quality = self.quality.unwrap_or(DEFAULT_JPEG_QUALITY);
        if quality == 0 || quality > 100 {
            return Err(invalid(format!("quality {} is not within 1-100", quality)));
        }
        let Some(format) = self.format.as_deref() else {
            return Ok(default);
        };
        if format.eq_ignore_ascii_case("html") {
            return Ok(RenderTarget::Html);
        }
        let target = match ImageEncoding::parse(format) {
            Some(ImageEncoding::Png) => RenderTarget::png(),
            Some(ImageEncoding::Jpeg) => RenderTarget::jpeg(quality),
            None => return Err(invalid(format!("unknown format `{}`", format))),
        };
        Ok(target.with_size(self.width, self.height))
    }
}

/// Body of `POST /documents/{id}/rotate`.
#[derive(Debug, Deserialize)]
pub struct RotateRequest {
    pub page: u32,
    pub angle: i32,
}

/// Body of `POST /documents/{id}/reorder`.
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub current: u32,
    pub new: u32,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_options")
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// One rendered page in a [`PagesResponse`].
#[derive(Debug, Serialize)]
pub struct PageSummary {
    /// Original page number
    pub number: u32,
    pub position: u32,
    pub rotation: u16,
    pub mime_type: String,
    pub file_name: String,
    pub size: usize,
    /// Names resolvable through the resources endpoint
    pub resources: Vec<String>,
}

impl From<&RenderedPage> for PageSummary {
    fn from(page: &RenderedPage) -> Self {
        Self {
            number: page.number,
            position: page.position,
            rotation: page.rotation,
            mime_type: page.mime_type().to_string(),
            file_name: page.file_name(),
            size: page.size_bytes(),
            resources: page.resources.iter().map(|r| r.name.clone()).collect(),
        }
    }
}

/// Response from the pages listing endpoint.
#[derive(Debug, Serialize)]
pub struct PagesResponse {
    pub document: String,
    pub cache_hit: bool,
    pub pages: Vec<PageSummary>,
}

/// Response from the cache eviction endpoints.
#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub removed: usize,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert ViewerError to HTTP response.
///
/// 5xx errors are logged at ERROR level, 404s at DEBUG, other 4xx at WARN.
impl IntoResponse for ViewerError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ViewerError::DocumentNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ViewerError::ResourceNotFound { .. } => (StatusCode::NOT_FOUND, "resource_not_found"),
            ViewerError::AttachmentNotFound { .. } => {
                (StatusCode::NOT_FOUND, "attachment_not_found")
            }
            ViewerError::InvalidPageNumber { .. } => (StatusCode::BAD_REQUEST, "invalid_page"),
            ViewerError::InvalidRotation { .. } => (StatusCode::BAD_REQUEST, "invalid_rotation"),
            ViewerError::InvalidOptions(_) => (StatusCode::BAD_REQUEST, "invalid_options"),
            ViewerError::Storage(StorageError::InvalidIdentifier(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_identifier")
            }
            ViewerError::UnsupportedFormat { .. } => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format")
            }
            ViewerError::CorruptDocument { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "corrupt_document")
            }
            ViewerError::License(_) => (StatusCode::FORBIDDEN, "license_error"),
            ViewerError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled"),
            ViewerError::Storage(StorageError::S3(_)) => (StatusCode::BAD_GATEWAY, "storage_error"),
            ViewerError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ViewerError::RenderFailure { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "render_error"),
            ViewerError::CacheIo(_) => (StatusCode::INTERNAL_SERVER_ERROR, "cache_error"),
            ViewerError::Export { .. } | ViewerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(error_type, status = status.as_u16(), "Server error: {}", message);
        } else if status == StatusCode::NOT_FOUND {
            debug!(error_type, status = status.as_u16(), "Not found: {}", message);
        } else {
            warn!(error_type, status = status.as_u16(), "Client error: {}", message);
        }

        let body = ErrorResponse::with_status(error_type, message, status);
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// `GET /health` returns `{"status": "healthy", "version": "..."}`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /documents/{id}/info`
pub async fn info_handler<S: DocumentSource + 'static>(
    State(state): State<AppState<S>>,
    Path(document_id): Path<String>,
) -> Result<Json<DocumentInfo>, ViewerError> {
    let info = state.viewer.get_document_info(&document_id).await?;
    Ok(Json(info))
}

async fn render<S: DocumentSource + 'static>(
    state: &AppState<S>,
    document_id: &str,
    query: &RenderQuery,
    options: &RenderOptions,
) -> ViewerResult<PageSet> {
    let target = query.target(state.viewer.default_target())?;
    match &query.attachment {
        Some(attachment) => {
            state
                .viewer
                .get_attachment_pages(document_id, attachment, options, &target)
                .await
        }
        None => {
            state
                .viewer
                .render_pages(document_id, options, &target, &CancellationToken::new())
                .await
        }
    }
}

/// Render a document and list its pages.
///
/// `GET /documents/{id}/pages?format=png&pages=1,3&watermark=DRAFT`
///
/// Pages are listed in presentation order; `number` is always the
/// original page number.
pub async fn pages_handler<S: DocumentSource + 'static>(
    State(state): State<AppState<S>>,
    Path(document_id): Path<String>,
    Query(query): Query<RenderQuery>,
) -> Result<Json<PagesResponse>, ViewerError> {
    let options = query.options()?;
    let set = render(&state, &document_id, &query, &options).await?;
    Ok(Json(PagesResponse {
        document: document_id,
        cache_hit: set.cache_hit,
        pages: set.pages.iter().map(|p| PageSummary::from(p.as_ref())).collect(),
    }))
}

/// Content of original page `n`.
///
/// `GET /documents/{id}/pages/{n}`
///
/// # Headers
///
/// - `Content-Type`: `text/html`, `image/png` or `image/jpeg`
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Cache-Hit: true|false`
pub async fn page_handler<S: DocumentSource + 'static>(
    State(state): State<AppState<S>>,
    Path((document_id, number)): Path<(String, u32)>,
    Query(query): Query<RenderQuery>,
) -> Result<Response, ViewerError> {
    let options = query.options()?.with_pages([number]);
    let set = render(&state, &document_id, &query, &options).await?;
    let page = set
        .pages
        .iter()
        .find(|p| p.number == number)
        .ok_or_else(|| ViewerError::Internal(format!("page {} missing from render", number)))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, page.mime_type().to_string()),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", state.cache_max_age),
            ),
            (CACHE_HIT_HEADER, set.cache_hit.to_string()),
        ],
        Body::from(page.content()),
    )
        .into_response())
}

/// `GET /documents/{id}/resources/{name}`
pub async fn resource_handler<S: DocumentSource + 'static>(
    State(state): State<AppState<S>>,
    Path((document_id, name)): Path<(String, String)>,
) -> Result<Response, ViewerError> {
    let resource = state.viewer.get_resource(&document_id, &name).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, resource.mime_type),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", state.cache_max_age),
            ),
        ],
        Body::from(resource.data),
    )
        .into_response())
}

/// `POST /documents/{id}/rotate` with `{"page": 2, "angle": 90}`
pub async fn rotate_handler<S: DocumentSource + 'static>(
    State(state): State<AppState<S>>,
    Path(document_id): Path<String>,
    Json(request): Json<RotateRequest>,
) -> Result<StatusCode, ViewerError> {
    state
        .viewer
        .rotate_page(&document_id, request.page, request.angle)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /documents/{id}/reorder` with `{"current": 3, "new": 1}`
pub async fn reorder_handler<S: DocumentSource + 'static>(
    State(state): State<AppState<S>>,
    Path(document_id): Path<String>,
    Json(request): Json<ReorderRequest>,
) -> Result<StatusCode, ViewerError> {
    state
        .viewer
        .reorder_page(&document_id, request.current, request.new)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /documents/{id}/cache`
pub async fn clear_document_cache_handler<S: DocumentSource + 'static>(
    State(state): State<AppState<S>>,
    Path(document_id): Path<String>,
) -> Result<Json<ClearCacheResponse>, ViewerError> {
    let removed = state.viewer.clear_cache(Some(&document_id)).await?;
    Ok(Json(ClearCacheResponse { removed }))
}

/// `DELETE /cache`
pub async fn clear_cache_handler<S: DocumentSource + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<ClearCacheResponse>, ViewerError> {
    let removed = state.viewer.clear_cache(None).await?;
    Ok(Json(ClearCacheResponse { removed }))
}

// =============================================================================
// Tests
// =============================================================================
