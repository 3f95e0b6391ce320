//! Test utilities for integration tests.
//!
//! Mock adapters with load counters and helpers for building documents.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use image::{ImageFormat, Rgb, RgbImage};

use docview::{
    issue_license, AdapterRegistry, DocumentFormat, DocumentModel, FormatAdapter, FormatError,
    MemoryDocumentSource, Page, SignedLicense, ViewerConfig, ViewerService,
};

pub const SECRET: &str = "integration-secret";

/// License valid for the foreseeable future.
pub fn licensed() -> Arc<SignedLicense> {
    let key = issue_license(SECRET, "integration tests", 4_102_444_800).unwrap();
    Arc::new(SignedLicense::new(SECRET, Some(key)))
}

/// License that expired in 1970.
pub fn expired_license() -> Arc<SignedLicense> {
    let key = issue_license(SECRET, "integration tests", 1).unwrap();
    Arc::new(SignedLicense::new(SECRET, Some(key)))
}

// =============================================================================
// Mock Adapters
// =============================================================================

/// Adapter producing `pages` text pages for any input, standing in for an
/// external office-format converter.
pub struct FakeOfficeAdapter {
    format: DocumentFormat,
    pages: u32,
}

impl FakeOfficeAdapter {
    pub fn new(format: DocumentFormat, pages: u32) -> Self {
        Self { format, pages }
    }
}

impl FormatAdapter for FakeOfficeAdapter {
    fn load(&self, name: &str, _data: &Bytes) -> Result<DocumentModel, FormatError> {
        let pages = (1..=self.pages)
            .map(|i| Page::text(vec![format!("{} page {}", name, i)]))
            .collect();
        DocumentModel::new(self.format, pages)
    }
}

/// Adapter wrapper counting `load` calls, optionally slowing them down.
pub struct CountingAdapter {
    inner: Arc<dyn FormatAdapter>,
    loads: Arc<AtomicUsize>,
    delay: Duration,
}

impl CountingAdapter {
    pub fn new(inner: Arc<dyn FormatAdapter>) -> Self {
        Self {
            inner,
            loads: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared counter, readable after the adapter moved into a registry.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }
}

impl FormatAdapter for CountingAdapter {
    fn load(&self, name: &str, data: &Bytes) -> Result<DocumentModel, FormatError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.inner.load(name, data)
    }
}

/// Built-in adapters with `format` served by `adapter`.
pub fn registry_with(format: DocumentFormat, adapter: CountingAdapter) -> (AdapterRegistry, Arc<AtomicUsize>) {
    let counter = adapter.counter();
    let registry = AdapterRegistry::with_builtin().with_adapter(format, Arc::new(adapter));
    (registry, counter)
}

pub fn loads(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

// =============================================================================
// Documents
// =============================================================================

/// Plain text with one form-feed separated page per entry.
pub fn text_document(pages: u32) -> String {
    (1..=pages)
        .map(|i| format!("Text of page {}", i))
        .collect::<Vec<_>>()
        .join("\u{c}")
}

/// Bytes that detect as a ZIP package.
pub fn zip_bytes() -> Bytes {
    let mut data = b"PK\x03\x04".to_vec();
    data.extend_from_slice(&[0u8; 60]);
    Bytes::from(data)
}

/// A small PNG image.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 7) as u8, (y * 5) as u8, 90]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// E-mail with a two-page text attachment `notes.txt`.
pub const EMAIL_WITH_ATTACHMENT: &str = "From: alice@example.com\n\
To: bob@example.com\n\
Subject: Notes\n\
Content-Type: multipart/mixed; boundary=\"SEP\"\n\
\n\
--SEP\n\
Content-Type: text/plain\n\
\n\
See attached.\n\
--SEP\n\
Content-Type: text/plain; name=\"notes.txt\"\n\
Content-Disposition: attachment; filename=\"notes.txt\"\n\
\n\
alpha\u{c}beta\n\
--SEP--\n";

// =============================================================================
// Services
// =============================================================================

/// Source holding `report.docx`, `notes.txt` and `mail.eml`.
pub fn sample_source() -> MemoryDocumentSource {
    MemoryDocumentSource::new()
        .with_document("report.docx", zip_bytes())
        .with_document("notes.txt", text_document(3))
        .with_document("mail.eml", EMAIL_WITH_ATTACHMENT)
}

/// Viewer over [`sample_source`] where `report.docx` has three pages and
/// `.txt` loads are counted.
pub fn sample_viewer(config: &ViewerConfig) -> (ViewerService<MemoryDocumentSource>, Arc<AtomicUsize>) {
    let text = CountingAdapter::new(Arc::new(docview::format::TextAdapter::new()));
    let (registry, counter) = registry_with(DocumentFormat::PlainText, text);
    let registry = registry.with_adapter(
        DocumentFormat::Docx,
        Arc::new(FakeOfficeAdapter::new(DocumentFormat::Docx, 3)),
    );
    let viewer = ViewerService::with_config(sample_source(), licensed(), config).with_adapters(registry);
    (viewer, counter)
}
