use serde::{Deserialize, Serialize};

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Encoding of image pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    Png,
    Jpeg,
}

impl ImageEncoding {
    pub const fn extension(&self) -> &'static str {
        match self {
            ImageEncoding::Png => "png",
            ImageEncoding::Jpeg => "jpg",
        }
    }

    pub const fn mime_type(&self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
            ImageEncoding::Jpeg => "image/jpeg",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Some(ImageEncoding::Png),
            "jpg" | "jpeg" => Some(ImageEncoding::Jpeg),
            _ => None,
        }
    }
}

/// What a render produces: HTML pages or encoded images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RenderTarget {
    /// HTML markup plus named resources
    Html,

    /// Encoded raster images, optionally resized to fit `width`/`height`
    Image {
        encoding: ImageEncoding,
        width: Option<u32>,
        height: Option<u32>,
        quality: u8,
    },
}

impl Default for RenderTarget {
    fn default() -> Self {
        RenderTarget::Html
    }
}

impl RenderTarget {
    /// PNG pages at their natural size.
    pub fn png() -> Self {
        RenderTarget::Image {
            encoding: ImageEncoding::Png,
            width: None,
            height: None,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// JPEG pages at their natural size.
    pub fn jpeg(quality: u8) -> Self {
        RenderTarget::Image {
            encoding: ImageEncoding::Jpeg,
            width: None,
            height: None,
            quality: quality.clamp(1, 100),
        }
    }

    /// Fit image pages inside `width` x `height`. No effect on HTML.
    pub fn with_size(self, width: Option<u32>, height: Option<u32>) -> Self {
        match self {
            RenderTarget::Html => RenderTarget::Html,
            RenderTarget::Image {
                encoding, quality, ..
            } => RenderTarget::Image {
                encoding,
                width,
                height,
                quality,
            },
        }
    }

    pub fn is_html(&self) -> bool {
        matches!(self, RenderTarget::Html)
    }

    /// File extension of the page content.
    pub fn extension(&self) -> &'static str {
        match self {
            RenderTarget::Html => "html",
            RenderTarget::Image { encoding, .. } => encoding.extension(),
        }
    }

    /// Canonical identifier for cache keys.
    pub fn fingerprint(&self) -> String {
        match self {
            RenderTarget::Html => "html".to_string(),
            RenderTarget::Image {
                encoding,
                width,
                height,
                quality,
            } => {
                let dim = |d: &Option<u32>| d.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
                let quality = match encoding {
                    ImageEncoding::Jpeg => quality.to_string(),
                    ImageEncoding::Png => "-".to_string(),
                };
                format!(
                    "{}-{}x{}-q{}",
                    encoding.extension(),
                    dim(width),
                    dim(height),
                    quality
                )
            }
        }
    }
}
