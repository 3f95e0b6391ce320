//! The page rasterizer / HTML generator seam.
//!
//! A [`PageRenderer`] turns one page of a [`DocumentModel`](crate::format::DocumentModel)
//! into raw content. Rotation, watermarking, resource embedding and final
//! image encoding are applied afterwards by the pipeline, so renderers
//! only deal with page content.

use std::io::Cursor;

use image::{DynamicImage, ImageReader, Rgba, RgbaImage};

use crate::error::RenderError;
use crate::format::{DocumentFormat, Page, PageContent};

use super::page::{Resource, ResourceKind};
use super::target::RenderTarget;

/// Stylesheet shared by text pages.
const TEXT_STYLESHEET: &str = "\
.page { position: relative; overflow: hidden; background: #fff; }
.page-text { margin: 40px; font: 12px/17px monospace; white-space: pre-wrap; }
.page-image { display: block; max-width: 100%; }
";

/// Raw output of a [`PageRenderer`].
#[derive(Debug, Clone)]
pub enum RawContent {
    /// Markup referencing `resources` by name (`href="..."` / `src="..."`)
    Html {
        markup: String,
        resources: Vec<Resource>,
    },

    /// Decoded pixels, encoded by the pipeline
    Bitmap(DynamicImage),
}

/// Renders page content for a target.
pub trait PageRenderer: Send + Sync {
    /// Render original page `number`.
    ///
    /// Must return [`RawContent::Html`] for [`RenderTarget::Html`] and
    /// [`RawContent::Bitmap`] for image targets.
    fn render_page(
        &self,
        page: &Page,
        number: u32,
        target: &RenderTarget,
    ) -> Result<RawContent, RenderError>;
}

/// Renderer for the built-in text and raster page content.
#[derive(Debug, Clone, Default)]
pub struct BuiltinRenderer;

impl BuiltinRenderer {
    pub fn new() -> Self {
        Self
    }
}

/// Escape text for inclusion in HTML.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn image_format(format: DocumentFormat) -> Result<image::ImageFormat, RenderError> {
    match format {
        DocumentFormat::Png => Ok(image::ImageFormat::Png),
        DocumentFormat::Jpeg => Ok(image::ImageFormat::Jpeg),
        DocumentFormat::Gif => Ok(image::ImageFormat::Gif),
        DocumentFormat::Bmp => Ok(image::ImageFormat::Bmp),
        other => Err(RenderError::Unsupported(format!(
            "{} is not a raster format",
            other.name()
        ))),
    }
}

fn text_html(page: &Page, number: u32, lines: &[String]) -> RawContent {
    let stylesheet = format!("page_{}.css", number);
    let body = lines
        .iter()
        .map(|l| escape_html(l))
        .collect::<Vec<_>>()
        .join("\n");
    let markup = format!(
        "<div class=\"page\" style=\"width: {}px; height: {}px\">\
<link rel=\"stylesheet\" href=\"{}\">\
<pre class=\"page-text\">{}</pre></div>",
        page.width, page.height, stylesheet, body
    );
    RawContent::Html {
        markup,
        resources: vec![Resource::new(
            stylesheet,
            ResourceKind::Style,
            "text/css",
            TEXT_STYLESHEET,
        )],
    }
}

/// Greeked preview: one grey bar per non-empty line.
fn text_bitmap(page: &Page, lines: &[String]) -> RawContent {
    const MARGIN: u32 = 40;
    const LINE_HEIGHT: u32 = 17;
    const BAR_HEIGHT: u32 = 9;
    const CHAR_WIDTH: u32 = 7;

    let mut canvas = RgbaImage::from_pixel(page.width, page.height, Rgba([255, 255, 255, 255]));
    let max_x = page.width.saturating_sub(MARGIN);

    for (i, line) in lines.iter().enumerate() {
        let y0 = MARGIN + i as u32 * LINE_HEIGHT;
        if y0 + BAR_HEIGHT > page.height.saturating_sub(MARGIN) {
            break;
        }
        let chars = line.chars().count() as u32;
        let x1 = (MARGIN + chars * CHAR_WIDTH).min(max_x);
        for y in y0..y0 + BAR_HEIGHT {
            for x in MARGIN..x1 {
                canvas.put_pixel(x, y, Rgba([160, 160, 160, 255]));
            }
        }
    }
    RawContent::Bitmap(DynamicImage::ImageRgba8(canvas))
}

fn raster_html(page: &Page, number: u32, data: &bytes::Bytes, format: DocumentFormat) -> RawContent {
    let name = format!("page_{}.{}", number, format.extension());
    let markup = format!(
        "<div class=\"page\" style=\"width: {w}px; height: {h}px\">\
<img class=\"page-image\" src=\"{name}\" width=\"{w}\" height=\"{h}\" alt=\"Page {number}\"></div>",
        w = page.width,
        h = page.height,
        name = name,
        number = number
    );
    RawContent::Html {
        markup,
        resources: vec![Resource::new(
            name,
            ResourceKind::Image,
            format.mime_type(),
            data.clone(),
        )],
    }
}

impl PageRenderer for BuiltinRenderer {
    fn render_page(
        &self,
        page: &Page,
        number: u32,
        target: &RenderTarget,
    ) -> Result<RawContent, RenderError> {
        match (&page.content, target) {
            (PageContent::Text(lines), RenderTarget::Html) => Ok(text_html(page, number, lines)),
            (PageContent::Text(lines), RenderTarget::Image { .. }) => Ok(text_bitmap(page, lines)),
            (PageContent::Raster { data, format }, RenderTarget::Html) => {
                Ok(raster_html(page, number, data, *format))
            }
            (PageContent::Raster { data, format }, RenderTarget::Image { .. }) => {
                let reader = ImageReader::with_format(Cursor::new(&data[..]), image_format(*format)?);
                let img = reader
                    .decode()
                    .map_err(|e| RenderError::Decode(e.to_string()))?;
                Ok(RawContent::Bitmap(img))
            }
        }
    }
}
