//! Rendering: options, targets and the page pipeline.
//!
//! A render turns a [`DocumentModel`](crate::format::DocumentModel) plus a
//! [`PageTransformState`](crate::transform::PageTransformState) snapshot
//! into [`RenderedPage`]s for a [`RenderTarget`]. The actual page content
//! comes from a [`PageRenderer`]; everything else (page selection,
//! rotation, watermark, resource embedding, encoding) is done here.

mod cancel;
mod options;
mod page;
mod pipeline;
mod renderer;
mod target;
mod watermark;

pub use cancel::CancellationToken;
pub use options::{Color, RenderOptions, Watermark, WatermarkPosition};
pub use page::{PageBody, RenderedPage, Resource, ResourceKind};
pub use pipeline::{effective_pages, RenderPipeline};
pub use renderer::{BuiltinRenderer, PageRenderer, RawContent};
pub use target::{ImageEncoding, RenderTarget, DEFAULT_JPEG_QUALITY};
