//! Watermark overlays for HTML and bitmap pages.
//!
//! HTML pages get an absolutely positioned overlay element carrying the
//! text. Bitmap pages get the text rasterized onto a translucent band in the
//! watermark color, sized to the requested width and placed at the requested
//! position. The diagonal placement shears the band along the page diagonal.

use std::sync::OnceLock;

use image::{Rgba, RgbaImage};
use rusttype::{point, Font, Scale};

use super::options::{Watermark, WatermarkPosition};
use super::renderer::escape_html;

/// Largest glyph height relative to page height.
const MAX_TEXT_HEIGHT_RATIO: f32 = 0.25;

/// Scale at which text is measured before fitting it to the band.
const MEASURE_SCALE: f32 = 64.0;

/// Band opacity used when the watermark color is fully opaque.
const BAND_OPACITY: u8 = 48;

static FONT: OnceLock<Option<Font<'static>>> = OnceLock::new();

fn font() -> Option<&'static Font<'static>> {
    FONT.get_or_init(|| Font::try_from_bytes(include_bytes!("../../fonts/DejaVuSans.ttf")))
        .as_ref()
}

fn css_placement(position: WatermarkPosition) -> &'static str {
    match position {
        WatermarkPosition::TopLeft => "top: 2%; left: 2%;",
        WatermarkPosition::TopCenter => "top: 2%; left: 50%; transform: translateX(-50%);",
        WatermarkPosition::TopRight => "top: 2%; right: 2%;",
        WatermarkPosition::Center => "top: 50%; left: 50%; transform: translate(-50%, -50%);",
        WatermarkPosition::Diagonal => {
            "top: 50%; left: 50%; transform: translate(-50%, -50%) rotate(-45deg);"
        }
        WatermarkPosition::BottomLeft => "bottom: 2%; left: 2%;",
        WatermarkPosition::BottomCenter => "bottom: 2%; left: 50%; transform: translateX(-50%);",
        WatermarkPosition::BottomRight => "bottom: 2%; right: 2%;",
    }
}

/// Overlay element to append inside a page container.
pub fn html_overlay(watermark: &Watermark) -> String {
    format!(
        "<div class=\"watermark\" style=\"position: absolute; {} width: {:.1}%; \
color: {}; text-align: center; pointer-events: none; white-space: nowrap; overflow: hidden;\">{}</div>",
        css_placement(watermark.position),
        watermark.width_fraction() * 100.0,
        watermark.color.to_css(),
        escape_html(&watermark.text)
    )
}

fn blend(base: Rgba<u8>, over: Rgba<u8>) -> Rgba<u8> {
    let alpha = u32::from(over[3]);
    let mix = |b: u8, o: u8| ((u32::from(o) * alpha + u32::from(b) * (255 - alpha)) / 255) as u8;
    Rgba([mix(base[0], over[0]), mix(base[1], over[1]), mix(base[2], over[2]), base[3]])
}

/// Glyph coverage of the watermark text, row-major over `width * height`.
struct Stamp {
    width: u32,
    height: u32,
    coverage: Vec<f32>,
}

impl Stamp {
    fn coverage(&self, x: u32, y: u32) -> f32 {
        self.coverage[(y * self.width + x) as usize]
    }
}

/// Advance width of `text` at `scale`.
fn text_width(font: &Font<'_>, text: &str, scale: Scale) -> f32 {
    font.layout(text, scale, point(0.0, 0.0))
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}

/// Rasterize `text` centred in a band `band_w` wide, with the glyph height
/// capped at `max_text_h`.
fn rasterize(text: &str, band_w: u32, max_text_h: f32) -> Stamp {
    let fallback_h = max_text_h.max(1.0).ceil() as u32;
    let Some(font) = font() else {
        return Stamp {
            width: band_w,
            height: fallback_h,
            coverage: vec![0.0; (band_w * fallback_h) as usize],
        };
    };

    let padding = (band_w as f32 * 0.05).max(1.0);
    let measured = text_width(font, text, Scale::uniform(MEASURE_SCALE));
    let fit = if measured > 0.0 {
        MEASURE_SCALE * (band_w as f32 - 2.0 * padding).max(1.0) / measured
    } else {
        max_text_h
    };
    let scale = Scale::uniform(fit.min(max_text_h).max(1.0));

    let metrics = font.v_metrics(scale);
    let line_h = metrics.ascent - metrics.descent;
    let height = (line_h + 2.0 * padding.min(line_h / 4.0)).ceil().max(1.0) as u32;
    let left = (band_w as f32 - text_width(font, text, scale)) / 2.0;
    let baseline = (height as f32 - line_h) / 2.0 + metrics.ascent;

    let mut coverage = vec![0.0f32; (band_w * height) as usize];
    for glyph in font.layout(text, scale, point(left, baseline)) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, v| {
            let x = bb.min.x + gx as i32;
            let y = bb.min.y + gy as i32;
            if x >= 0 && y >= 0 && (x as u32) < band_w && (y as u32) < height {
                let cell = &mut coverage[(y as u32 * band_w + x as u32) as usize];
                *cell = cell.max(v);
            }
        });
    }

    Stamp {
        width: band_w,
        height,
        coverage,
    }
}

/// Paint the watermark band and its text onto `img`.
pub fn apply_bitmap(img: &mut RgbaImage, watermark: &Watermark) {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let color = watermark.color;
    let band_alpha = if color.a == 255 { BAND_OPACITY } else { color.a / 2 };
    let band = Rgba([color.r, color.g, color.b, band_alpha]);
    let ink = Rgba([color.r, color.g, color.b, color.a]);

    let band_w = ((width as f32 * watermark.width_fraction()).round() as u32).clamp(1, width);
    let stamp = rasterize(
        &watermark.text,
        band_w,
        height as f32 * MAX_TEXT_HEIGHT_RATIO,
    );
    let band_h = stamp.height.min(height);

    let paint = |img: &mut RgbaImage, x: u32, y: u32, sx: u32, sy: u32| {
        let mut pixel = blend(*img.get_pixel(x, y), band);
        let v = stamp.coverage(sx, sy);
        if v > 0.0 {
            let a = (f32::from(ink[3]) * v.min(1.0)).round() as u8;
            pixel = blend(pixel, Rgba([ink[0], ink[1], ink[2], a]));
        }
        img.put_pixel(x, y, pixel);
    };

    if watermark.position == WatermarkPosition::Diagonal {
        // Band along the bottom-left to top-right diagonal, centred
        let x0 = (width - band_w) / 2;
        for sx in 0..band_w {
            let x = x0 + sx;
            let y_center = height as f32 - (x as f32 + 0.5) * height as f32 / width as f32;
            let top = y_center - band_h as f32 / 2.0;
            for sy in 0..band_h {
                let y = top + sy as f32;
                if y >= 0.0 && (y as u32) < height {
                    paint(img, x, y as u32, sx, sy);
                }
            }
        }
        return;
    }

    let margin_x = width / 50;
    let margin_y = height / 50;
    let x0 = match watermark.position {
        WatermarkPosition::TopLeft | WatermarkPosition::BottomLeft => margin_x,
        WatermarkPosition::TopRight | WatermarkPosition::BottomRight => {
            width.saturating_sub(band_w + margin_x)
        }
        _ => (width - band_w) / 2,
    };
    let y0 = match watermark.position {
        WatermarkPosition::TopLeft | WatermarkPosition::TopCenter | WatermarkPosition::TopRight => {
            margin_y
        }
        WatermarkPosition::BottomLeft
        | WatermarkPosition::BottomCenter
        | WatermarkPosition::BottomRight => height.saturating_sub(band_h + margin_y),
        _ => (height - band_h) / 2,
    };

    for sy in 0..band_h.min(height - y0) {
        for sx in 0..band_w.min(width - x0) {
            paint(img, x0 + sx, y0 + sy, sx, sy);
        }
    }
}
