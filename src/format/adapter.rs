//! Format adapter contract and the page-addressable document model.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::FormatError;

use super::detect::DocumentFormat;
use super::email::EmailAdapter;
use super::raster::RasterAdapter;
use super::text::TextAdapter;

/// Default page size (A4 at 96 DPI).
pub const DEFAULT_PAGE_WIDTH: u32 = 794;
pub const DEFAULT_PAGE_HEIGHT: u32 = 1123;

// =============================================================================
// Document Model
// =============================================================================

/// Content of one page, as produced by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum PageContent {
    /// Lines of text
    Text(Vec<String>),

    /// An encoded raster image
    Raster { data: Bytes, format: DocumentFormat },
}

/// A single page in a [`DocumentModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Page width in pixels
    pub width: u32,

    /// Page height in pixels
    pub height: u32,

    /// Page content
    pub content: PageContent,
}

impl Page {
    /// Text page with the default page size.
    pub fn text(lines: Vec<String>) -> Self {
        Self {
            width: DEFAULT_PAGE_WIDTH,
            height: DEFAULT_PAGE_HEIGHT,
            content: PageContent::Text(lines),
        }
    }
}

/// A document embedded in another (e-mail attachment, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// File name of the attachment
    pub name: String,

    /// Declared MIME type, if any
    pub mime_type: Option<String>,

    /// Decoded attachment bytes
    pub data: Bytes,
}

impl Attachment {
    /// Extension of the attachment name, used as its file type.
    pub fn file_type(&self) -> Option<&str> {
        super::detect::extension_of(&self.name)
    }
}

/// Page-addressable document produced by a [`FormatAdapter`].
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentModel {
    format: DocumentFormat,
    pages: Vec<Page>,
    attachments: Vec<Attachment>,
}

impl DocumentModel {
    /// Create a model. A document always has at least one page.
    pub fn new(format: DocumentFormat, pages: Vec<Page>) -> Result<Self, FormatError> {
        if pages.is_empty() {
            return Err(FormatError::CorruptDocument {
                reason: "document has no pages".to_string(),
            });
        }
        Ok(Self {
            format,
            pages,
            attachments: Vec::new(),
        })
    }

    /// Attach embedded documents.
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Source format.
    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Number of pages.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Page by 1-based number.
    pub fn page(&self, number: u32) -> Option<&Page> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.pages.get(index)
    }

    /// All pages in original order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Embedded documents.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Look up an attachment by name.
    pub fn attachment(&self, name: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.name == name)
    }
}

// =============================================================================
// FormatAdapter Trait
// =============================================================================

/// Converts raw document bytes into a [`DocumentModel`].
///
/// Adapters are pure: they perform no I/O and hold no per-document state,
/// so one instance serves every document of its format.
pub trait FormatAdapter: Send + Sync {
    /// Parse `data` into a page-addressable model.
    ///
    /// `name` is the document file name, for error messages and
    /// adapters that need the extension.
    fn load(&self, name: &str, data: &Bytes) -> Result<DocumentModel, FormatError>;
}

// =============================================================================
// Adapter Registry
// =============================================================================

/// Maps formats to the adapters able to load them.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<DocumentFormat, Arc<dyn FormatAdapter>>,
}

impl AdapterRegistry {
    /// Registry with no adapters.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in text, raster and e-mail adapters.
    pub fn with_builtin() -> Self {
        let raster: Arc<dyn FormatAdapter> = Arc::new(RasterAdapter::new());
        Self::empty()
            .with_adapter(DocumentFormat::PlainText, Arc::new(TextAdapter::new()))
            .with_adapter(DocumentFormat::Email, Arc::new(EmailAdapter::new()))
            .with_adapter(DocumentFormat::Png, raster.clone())
            .with_adapter(DocumentFormat::Jpeg, raster.clone())
            .with_adapter(DocumentFormat::Gif, raster.clone())
            .with_adapter(DocumentFormat::Bmp, raster)
    }

    /// Builder-style registration.
    pub fn with_adapter(mut self, format: DocumentFormat, adapter: Arc<dyn FormatAdapter>) -> Self {
        self.register(format, adapter);
        self
    }

    /// Register (or replace) the adapter for `format`.
    pub fn register(&mut self, format: DocumentFormat, adapter: Arc<dyn FormatAdapter>) {
        self.adapters.insert(format, adapter);
    }

    /// Adapter for `format`.
    pub fn adapter_for(&self, format: DocumentFormat) -> Result<Arc<dyn FormatAdapter>, FormatError> {
        self.adapters
            .get(&format)
            .cloned()
            .ok_or_else(|| FormatError::UnsupportedFormat {
                reason: format!("no adapter registered for {}", format.name()),
            })
    }

    /// Whether an adapter is registered for `format`.
    pub fn supports(&self, format: DocumentFormat) -> bool {
        self.adapters.contains_key(&format)
    }
}

// =============================================================================
// Tests
// =============================================================================
