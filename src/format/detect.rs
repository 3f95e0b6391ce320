//! Document format detection.
//!
//! Detection examines magic bytes first and falls back to the file
//! extension. Container formats (OLE2 compound files and ZIP packages) are
//! disambiguated by extension since their magic bytes are shared by many
//! document types.

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

// =============================================================================
// DocumentFormat
// =============================================================================

/// Detected document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Doc,
    Xlsx,
    Xls,
    Pptx,
    Ppt,
    /// Outlook message (OLE2)
    Msg,
    /// RFC 822 message
    Email,
    PlainText,
    Png,
    Jpeg,
    Gif,
    Bmp,
}

impl DocumentFormat {
    /// Human-readable name.
    pub const fn name(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "Word Open XML",
            DocumentFormat::Doc => "Word 97-2003",
            DocumentFormat::Xlsx => "Excel Open XML",
            DocumentFormat::Xls => "Excel 97-2003",
            DocumentFormat::Pptx => "PowerPoint Open XML",
            DocumentFormat::Ppt => "PowerPoint 97-2003",
            DocumentFormat::Msg => "Outlook Message",
            DocumentFormat::Email => "E-mail Message",
            DocumentFormat::PlainText => "Plain Text",
            DocumentFormat::Png => "PNG Image",
            DocumentFormat::Jpeg => "JPEG Image",
            DocumentFormat::Gif => "GIF Image",
            DocumentFormat::Bmp => "Bitmap Image",
        }
    }

    /// Canonical file extension.
    pub const fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Doc => "doc",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Xls => "xls",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Ppt => "ppt",
            DocumentFormat::Msg => "msg",
            DocumentFormat::Email => "eml",
            DocumentFormat::PlainText => "txt",
            DocumentFormat::Png => "png",
            DocumentFormat::Jpeg => "jpg",
            DocumentFormat::Gif => "gif",
            DocumentFormat::Bmp => "bmp",
        }
    }

    /// MIME type, used for resource and HTTP content types.
    pub const fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::Doc => "application/msword",
            DocumentFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            DocumentFormat::Xls => "application/vnd.ms-excel",
            DocumentFormat::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            DocumentFormat::Ppt => "application/vnd.ms-powerpoint",
            DocumentFormat::Msg => "application/vnd.ms-outlook",
            DocumentFormat::Email => "message/rfc822",
            DocumentFormat::PlainText => "text/plain",
            DocumentFormat::Png => "image/png",
            DocumentFormat::Jpeg => "image/jpeg",
            DocumentFormat::Gif => "image/gif",
            DocumentFormat::Bmp => "image/bmp",
        }
    }

    /// Whether documents of this format are single raster images.
    pub const fn is_raster(&self) -> bool {
        matches!(
            self,
            DocumentFormat::Png | DocumentFormat::Jpeg | DocumentFormat::Gif | DocumentFormat::Bmp
        )
    }

    /// Look up a format by file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let format = match ext.to_ascii_lowercase().as_str() {
            "pdf" => DocumentFormat::Pdf,
            "docx" | "docm" | "dotx" => DocumentFormat::Docx,
            "doc" | "dot" => DocumentFormat::Doc,
            "xlsx" | "xlsm" => DocumentFormat::Xlsx,
            "xls" => DocumentFormat::Xls,
            "pptx" | "pptm" => DocumentFormat::Pptx,
            "ppt" => DocumentFormat::Ppt,
            "msg" => DocumentFormat::Msg,
            "eml" => DocumentFormat::Email,
            "txt" | "text" | "log" | "md" | "csv" => DocumentFormat::PlainText,
            "png" => DocumentFormat::Png,
            "jpg" | "jpeg" => DocumentFormat::Jpeg,
            "gif" => DocumentFormat::Gif,
            "bmp" => DocumentFormat::Bmp,
            _ => return None,
        };
        Some(format)
    }
}

// =============================================================================
// Detection
// =============================================================================

const PDF_MAGIC: &[u8] = b"%PDF-";
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const GIF_MAGIC: &[u8] = b"GIF8";
const BMP_MAGIC: &[u8] = b"BM";
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: &[u8] = &[b'P', b'K', 0x03, 0x04];

/// Number of leading bytes inspected by [`detect_format`].
pub const DETECTION_HEADER_BYTES: usize = 16;

/// Extension of a file name, if any.
pub fn extension_of(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

/// Detect the format of a document from its name and leading bytes.
///
/// # Returns
/// * `Ok(DocumentFormat)` - The detected format
/// * `Err(FormatError::UnsupportedFormat)` - Neither the content nor the
///   extension identifies a known format
pub fn detect_format(name: &str, head: &[u8]) -> Result<DocumentFormat, FormatError> {
    let by_extension = extension_of(name).and_then(DocumentFormat::from_extension);

    if head.starts_with(PDF_MAGIC) {
        return Ok(DocumentFormat::Pdf);
    }
    if head.starts_with(PNG_MAGIC) {
        return Ok(DocumentFormat::Png);
    }
    if head.starts_with(JPEG_MAGIC) {
        return Ok(DocumentFormat::Jpeg);
    }
    if head.starts_with(GIF_MAGIC) {
        return Ok(DocumentFormat::Gif);
    }

    if head.starts_with(OLE2_MAGIC) {
        return match by_extension {
            Some(f @ (DocumentFormat::Doc | DocumentFormat::Xls | DocumentFormat::Ppt | DocumentFormat::Msg)) => Ok(f),
            _ => Err(FormatError::UnsupportedFormat {
                reason: format!("unrecognised OLE2 compound document '{}'", name),
            }),
        };
    }

    if head.starts_with(ZIP_MAGIC) {
        return match by_extension {
            Some(f @ (DocumentFormat::Docx | DocumentFormat::Xlsx | DocumentFormat::Pptx)) => Ok(f),
            _ => Err(FormatError::UnsupportedFormat {
                reason: format!("unrecognised ZIP package '{}'", name),
            }),
        };
    }

    // "BM" is too short to trust on its own
    if head.starts_with(BMP_MAGIC) && by_extension == Some(DocumentFormat::Bmp) {
        return Ok(DocumentFormat::Bmp);
    }

    match by_extension {
        // Binary formats must have matched their magic above
        Some(f) if f.is_raster() || f == DocumentFormat::Pdf => {
            Err(FormatError::CorruptDocument {
                reason: format!("'{}' does not start with a valid {} header", name, f.name()),
            })
        }
        Some(f) => Ok(f),
        None => Err(FormatError::UnsupportedFormat {
            reason: format!("cannot determine format of '{}'", name),
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================
