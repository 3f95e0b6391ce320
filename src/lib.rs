//! # docview
//!
//! A document viewing engine: renders documents into HTML or image pages,
//! caches the results and serves them over HTTP.
//!
//! ## Features
//!
//! - **Render cache**: pages are cached under a key made of the document
//!   identity, render options, page transforms and output target; concurrent
//!   requests for the same key share a single render
//! - **Page transforms**: per-document rotation and reordering that later
//!   renders honour
//! - **Pluggable formats**: format adapters and page renderers plug in
//!   through traits; text, raster images and e-mail are built in
//! - **Storage**: local directories, S3-compatible buckets or in-memory handles
//!
//! ## Architecture
//!
//! - [`storage`] - document sources and identities
//! - [`mod@format`] - format detection and adapters
//! - [`transform`] - rotate/reorder state
//! - [`render`] - render options, targets and the page pipeline
//! - [`cache`] - artifact cache and its memory/disk stores
//! - [`license`] - license gate
//! - [`service`] - the [`ViewerService`] entry point
//! - [`server`] - Axum-based HTTP server
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docview::{issue_license, LocalDocumentSource, SignedLicense, ViewerService};
//!
//! # async fn run() -> docview::ViewerResult<()> {
//! let key = issue_license("secret", "ACME", u64::MAX)?;
//! let license = SignedLicense::new("secret", Some(key));
//! let viewer = ViewerService::new(LocalDocumentSource::new("docs"), Arc::new(license));
//!
//! viewer.rotate_page("notes.txt", 2, 90).await?;
//! for page in viewer.get_pages("notes.txt", None).await? {
//!     println!("{} -> {} bytes", page.file_name(), page.size_bytes());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod license;
pub mod render;
pub mod server;
pub mod service;
pub mod storage;
pub mod transform;

// Re-export commonly used types
pub use cache::{
    ArtifactCache, ArtifactStore, CacheEntry, CacheLookup, DiskArtifactStore, LookupOutcome,
    MemoryArtifactStore, RenderKey, DEFAULT_MEMORY_CAPACITY,
};
pub use config::{CacheBackend, Cli, Command, ViewerConfig};
pub use error::{
    FormatError, LicenseError, RenderError, StorageError, ViewerError, ViewerResult,
};
pub use format::{
    detect_format, AdapterRegistry, Attachment, DocumentFormat, DocumentModel, FormatAdapter,
    Page, PageContent,
};
pub use license::{issue_license, LicenseGate, LicenseKey, SignedLicense};
pub use render::{
    CancellationToken, Color, ImageEncoding, PageBody, PageRenderer, RenderOptions,
    RenderPipeline, RenderTarget, RenderedPage, Resource, ResourceKind, Watermark,
    WatermarkPosition,
};
pub use server::{create_router, AppState, ErrorResponse, RouterConfig};
pub use service::{export_pages, DocumentInfo, PageSet, ViewerService};
pub use storage::{
    create_s3_client, DocumentIdentity, DocumentSource, LocalDocumentSource,
    MemoryDocumentSource, S3DocumentSource, SourceDocument,
};
pub use transform::{PageTransformState, TransformRegistry, Transformations};
