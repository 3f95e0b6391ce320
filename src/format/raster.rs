//! Raster image adapter: one page per image.

use std::io::Cursor;

use bytes::Bytes;
use image::ImageReader;

use crate::error::FormatError;

use super::adapter::{DocumentModel, FormatAdapter, Page, PageContent};
use super::detect::{detect_format, DocumentFormat};

/// Adapter for PNG, JPEG, GIF and BMP images.
///
/// Only the header is decoded at load time; pixels are decoded by the
/// renderer.
#[derive(Debug, Clone, Default)]
pub struct RasterAdapter;

impl RasterAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn image_format(format: DocumentFormat) -> Option<image::ImageFormat> {
    match format {
        DocumentFormat::Png => Some(image::ImageFormat::Png),
        DocumentFormat::Jpeg => Some(image::ImageFormat::Jpeg),
        DocumentFormat::Gif => Some(image::ImageFormat::Gif),
        DocumentFormat::Bmp => Some(image::ImageFormat::Bmp),
        _ => None,
    }
}

impl FormatAdapter for RasterAdapter {
    fn load(&self, name: &str, data: &Bytes) -> Result<DocumentModel, FormatError> {
        let format = detect_format(name, data)?;
        let decoder_format = image_format(format).ok_or_else(|| FormatError::UnsupportedFormat {
            reason: format!("'{}' is not a raster image", name),
        })?;

        let reader = ImageReader::with_format(Cursor::new(&data[..]), decoder_format);
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| FormatError::CorruptDocument {
                reason: format!("'{}': {}", name, e),
            })?;

        let page = Page {
            width,
            height,
            content: PageContent::Raster {
                data: data.clone(),
                format,
            },
        };
        DocumentModel::new(format, vec![page])
    }
}
