//! Render options and their fingerprint.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ViewerError, ViewerResult};
use crate::transform::Transformations;

// =============================================================================
// Watermark
// =============================================================================

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GRAY: Color = Color::rgb(128, 128, 128);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rrggbb`, `#rrggbbaa` or a basic color name.
    pub fn parse(s: &str) -> Option<Self> {
        let named = match s.to_ascii_lowercase().as_str() {
            "black" => Some(Color::BLACK),
            "white" => Some(Color::rgb(255, 255, 255)),
            "red" => Some(Color::RED),
            "green" => Some(Color::rgb(0, 128, 0)),
            "blue" => Some(Color::rgb(0, 0, 255)),
            "gray" | "grey" => Some(Color::GRAY),
            _ => None,
        };
        if named.is_some() {
            return named;
        }

        let hex = s.strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Color::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Color {
                r: channel(0)?,
                g: channel(2)?,
                b: channel(4)?,
                a: channel(6)?,
            }),
            _ => None,
        }
    }

    /// CSS `rgba(...)` notation.
    pub fn to_css(&self) -> String {
        format!(
            "rgba({}, {}, {}, {:.3})",
            self.r,
            self.g,
            self.b,
            f32::from(self.a) / 255.0
        )
    }
}

/// Placement of a watermark on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopCenter,
    TopRight,
    Center,
    Diagonal,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl WatermarkPosition {
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "top-left" => Some(Self::TopLeft),
            "top-center" => Some(Self::TopCenter),
            "top-right" => Some(Self::TopRight),
            "center" => Some(Self::Center),
            "diagonal" => Some(Self::Diagonal),
            "bottom-left" => Some(Self::BottomLeft),
            "bottom-center" => Some(Self::BottomCenter),
            "bottom-right" => Some(Self::BottomRight),
            _ => None,
        }
    }
}

/// Text overlay applied to every rendered page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub text: String,
    pub color: Color,
    pub position: WatermarkPosition,

    /// Share of the page width covered, in percent (0, 100]
    pub width: Option<f32>,
}

impl Watermark {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: Color::GRAY,
            position: WatermarkPosition::Diagonal,
            width: None,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_position(mut self, position: WatermarkPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    /// Width as a fraction of the page, defaulting to half the page.
    pub fn width_fraction(&self) -> f32 {
        self.width.map(|w| w / 100.0).unwrap_or(0.5)
    }
}

// =============================================================================
// RenderOptions
// =============================================================================

/// Immutable description of what to render.
///
/// Every field takes part in [`RenderOptions::fingerprint`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Original page numbers to render; empty means all pages
    pub page_numbers_to_render: BTreeSet<u32>,

    /// Maximum number of pages to render
    pub count_pages_to_render: Option<u32>,

    /// First presentation position rendered when no explicit pages are given
    pub start_page: u32,

    /// Inline resources into the HTML instead of listing them
    pub resources_embedded: bool,

    pub watermark: Option<Watermark>,

    /// Registered transforms honoured by this render
    pub transformations: Transformations,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_numbers_to_render: BTreeSet::new(),
            count_pages_to_render: None,
            start_page: 1,
            resources_embedded: false,
            watermark: None,
            transformations: Transformations::ALL,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(mut self, pages: impl IntoIterator<Item = u32>) -> Self {
        self.page_numbers_to_render = pages.into_iter().collect();
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count_pages_to_render = Some(count);
        self
    }

    pub fn starting_at(mut self, position: u32) -> Self {
        self.start_page = position;
        self
    }

    pub fn embed_resources(mut self, embedded: bool) -> Self {
        self.resources_embedded = embedded;
        self
    }

    pub fn with_watermark(mut self, watermark: Watermark) -> Self {
        self.watermark = Some(watermark);
        self
    }

    pub fn with_transformations(mut self, transformations: Transformations) -> Self {
        self.transformations = transformations;
        self
    }

    /// Check values that do not depend on the document.
    pub fn validate(&self) -> ViewerResult<()> {
        if self.count_pages_to_render == Some(0) {
            return Err(ViewerError::InvalidOptions(
                "count_pages_to_render must be at least 1".to_string(),
            ));
        }
        if self.start_page == 0 {
            return Err(ViewerError::InvalidOptions(
                "start_page is 1-based".to_string(),
            ));
        }
        if let Some(watermark) = &self.watermark {
            if watermark.text.trim().is_empty() {
                return Err(ViewerError::InvalidOptions(
                    "watermark text is empty".to_string(),
                ));
            }
            if let Some(width) = watermark.width {
                if !(width > 0.0 && width <= 100.0) {
                    return Err(ViewerError::InvalidOptions(format!(
                        "watermark width {} outside (0, 100]",
                        width
                    )));
                }
            }
        }
        Ok(())
    }

    /// Hex SHA-256 of the canonical JSON serialization.
    pub fn fingerprint(&self) -> String {
        // Struct fields serialize in declaration order and the page set is
        // sorted, so equal options always produce identical JSON
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }
}
