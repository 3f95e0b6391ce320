//! Drives document pages through a [`PageRenderer`] into [`RenderedPage`]s.
//!
//! ```text
//!  DocumentModel ─┐
//!                 ├─► effective pages ─► PageRenderer ─► rotate ─► watermark ─► embed/encode
//!  TransformState ┘     (order, filter)     (per page)
//! ```
//!
//! The whole call fails on the first page error; partial page sets are
//! never returned.

use std::io::Cursor;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::error::{RenderError, ViewerError, ViewerResult};
use crate::format::DocumentModel;
use crate::transform::PageTransformState;

use super::cancel::CancellationToken;
use super::options::RenderOptions;
use super::page::{PageBody, RenderedPage, Resource, ResourceKind};
use super::renderer::{BuiltinRenderer, PageRenderer, RawContent};
use super::target::{ImageEncoding, RenderTarget};
use super::watermark;

// =============================================================================
// Effective page list
// =============================================================================

/// Original page numbers to render, in presentation order.
///
/// `state` must already be the view honouring `options.transformations`.
pub fn effective_pages(state: &PageTransformState, options: &RenderOptions) -> ViewerResult<Vec<u32>> {
    options.validate()?;
    let page_count = state.page_count();

    let selected: Vec<u32> = if options.page_numbers_to_render.is_empty() {
        if options.start_page > page_count {
            return Err(ViewerError::InvalidPageNumber {
                page: options.start_page,
                page_count,
            });
        }
        state
            .order()
            .iter()
            .skip((options.start_page - 1) as usize)
            .copied()
            .collect()
    } else {
        if let Some(&page) = options
            .page_numbers_to_render
            .iter()
            .find(|&&p| p == 0 || p > page_count)
        {
            return Err(ViewerError::InvalidPageNumber { page, page_count });
        }
        state
            .order()
            .iter()
            .copied()
            .filter(|p| options.page_numbers_to_render.contains(p))
            .collect()
    };

    Ok(match options.count_pages_to_render {
        Some(count) => selected.into_iter().take(count as usize).collect(),
        None => selected,
    })
}

// =============================================================================
// HTML finishing
// =============================================================================

/// Inline `resources` into `markup`: stylesheets as `<style>`, everything
/// else as base64 data URIs.
pub(crate) fn embed_resources(markup: &str, resources: &[Resource]) -> String {
    let mut html = markup.to_string();
    for resource in resources {
        match resource.kind {
            ResourceKind::Style => {
                let link = format!("<link rel=\"stylesheet\" href=\"{}\">", resource.name);
                let css = String::from_utf8_lossy(&resource.data);
                html = html.replace(&link, &format!("<style>{}</style>", css));
            }
            ResourceKind::Image | ResourceKind::Font => {
                let uri = format!(
                    "data:{};base64,{}",
                    resource.mime_type,
                    STANDARD.encode(&resource.data)
                );
                html = html
                    .replace(&format!("src=\"{}\"", resource.name), &format!("src=\"{}\"", uri))
                    .replace(&format!("url({})", resource.name), &format!("url({})", uri));
            }
        }
    }
    html
}

fn frame_html(markup: &str, number: u32, position: u32, rotation: u16, options: &RenderOptions) -> String {
    let mut style = String::from("position: relative;");
    if rotation != 0 {
        style.push_str(&format!(" transform: rotate({}deg);", rotation));
    }
    let overlay = options
        .watermark
        .as_ref()
        .map(watermark::html_overlay)
        .unwrap_or_default();
    format!(
        "<div class=\"page-frame\" data-page=\"{}\" data-position=\"{}\" style=\"{}\">{}{}</div>",
        number, position, style, markup, overlay
    )
}

// =============================================================================
// Bitmap finishing
// =============================================================================

fn rotate(img: DynamicImage, rotation: u16) -> DynamicImage {
    match rotation {
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        _ => img,
    }
}

fn resize(img: DynamicImage, width: Option<u32>, height: Option<u32>) -> DynamicImage {
    let (w, h) = (img.width().max(1), img.height().max(1));
    match (width, height) {
        (Some(tw), Some(th)) => img.resize(tw.max(1), th.max(1), FilterType::Triangle),
        (Some(tw), None) => {
            let th = ((u64::from(h) * u64::from(tw)) / u64::from(w)).max(1) as u32;
            img.resize_exact(tw.max(1), th, FilterType::Triangle)
        }
        (None, Some(th)) => {
            let tw = ((u64::from(w) * u64::from(th)) / u64::from(h)).max(1) as u32;
            img.resize_exact(tw, th.max(1), FilterType::Triangle)
        }
        (None, None) => img,
    }
}

fn encode(img: &DynamicImage, encoding: ImageEncoding, quality: u8) -> Result<Bytes, RenderError> {
    let mut output = Vec::new();
    match encoding {
        ImageEncoding::Png => img
            .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
            .map_err(|e| RenderError::Encode(e.to_string()))?,
        ImageEncoding::Jpeg => {
            let rgb = img.to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100));
            encoder
                .encode_image(&rgb)
                .map_err(|e| RenderError::Encode(e.to_string()))?;
        }
    }
    Ok(Bytes::from(output))
}

// =============================================================================
// RenderPipeline
// =============================================================================

/// Renders a document model under a transform state and options.
#[derive(Clone)]
pub struct RenderPipeline {
    renderer: Arc<dyn PageRenderer>,
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RenderPipeline {
    pub fn new(renderer: Arc<dyn PageRenderer>) -> Self {
        Self { renderer }
    }

    /// Pipeline over the [`BuiltinRenderer`].
    pub fn builtin() -> Self {
        Self::new(Arc::new(BuiltinRenderer::new()))
    }

    /// Render the effective pages of `model` in presentation order.
    ///
    /// Returned pages carry their original page number and their
    /// presentation position.
    pub fn render(
        &self,
        model: &DocumentModel,
        state: &PageTransformState,
        options: &RenderOptions,
        target: &RenderTarget,
        cancel: &CancellationToken,
    ) -> ViewerResult<Vec<RenderedPage>> {
        let view = if state.page_count() == model.page_count() {
            state.effective(options.transformations)
        } else {
            PageTransformState::identity(model.page_count())
        };
        let pages = effective_pages(&view, options)?;
        debug!(
            pages = pages.len(),
            target = %target.fingerprint(),
            "Rendering document pages"
        );

        let mut rendered = Vec::with_capacity(pages.len());
        for number in pages {
            cancel.check()?;
            let position = view.position_of(number).unwrap_or(number);
            let rotation = view.rotation(number);
            let page = self.render_one(model, number, position, rotation, options, target)?;
            rendered.push(page);
        }
        Ok(rendered)
    }

    fn render_one(
        &self,
        model: &DocumentModel,
        number: u32,
        position: u32,
        rotation: u16,
        options: &RenderOptions,
        target: &RenderTarget,
    ) -> ViewerResult<RenderedPage> {
        let failure = |cause: RenderError| ViewerError::RenderFailure { page: number, cause };

        let page = model.page(number).ok_or(ViewerError::InvalidPageNumber {
            page: number,
            page_count: model.page_count(),
        })?;
        let raw = self.renderer.render_page(page, number, target).map_err(failure)?;

        let (body, resources) = match (raw, target) {
            (RawContent::Html { markup, resources }, RenderTarget::Html) => {
                let (markup, resources) = if options.resources_embedded {
                    (embed_resources(&markup, &resources), Vec::new())
                } else {
                    (markup, resources)
                };
                let html = frame_html(&markup, number, position, rotation, options);
                (PageBody::Html(html), resources)
            }
            (
                RawContent::Bitmap(img),
                RenderTarget::Image {
                    encoding,
                    width,
                    height,
                    quality,
                },
            ) => {
                let img = resize(rotate(img, rotation), *width, *height);
                let img = match &options.watermark {
                    Some(wm) => {
                        let mut rgba = img.to_rgba8();
                        watermark::apply_bitmap(&mut rgba, wm);
                        DynamicImage::ImageRgba8(rgba)
                    }
                    None => img,
                };
                let data = encode(&img, *encoding, *quality).map_err(failure)?;
                (
                    PageBody::Image {
                        encoding: *encoding,
                        data,
                    },
                    Vec::new(),
                )
            }
            _ => {
                return Err(failure(RenderError::Unsupported(format!(
                    "renderer output does not match target {}",
                    target.fingerprint()
                ))))
            }
        };

        Ok(RenderedPage {
            number,
            position,
            rotation,
            body,
            resources,
        })
    }
}
