//! Plain-text adapter.
//!
//! Pages break on form feeds (`\x0C`) and every [`LINES_PER_PAGE`] lines.

use bytes::Bytes;

use crate::error::FormatError;

use super::adapter::{DocumentModel, FormatAdapter, Page};
use super::detect::DocumentFormat;

/// Maximum number of lines on one page.
pub const LINES_PER_PAGE: usize = 60;

/// Adapter for UTF-8 text documents.
#[derive(Debug, Clone, Default)]
pub struct TextAdapter;

impl TextAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// Split text into pages of lines.
pub(crate) fn paginate(text: &str) -> Vec<Vec<String>> {
    let mut pages = Vec::new();
    for section in text.split('\x0C') {
        let lines: Vec<String> = section
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect();
        if lines.is_empty() {
            pages.push(Vec::new());
            continue;
        }
        for chunk in lines.chunks(LINES_PER_PAGE) {
            pages.push(chunk.to_vec());
        }
    }
    // A trailing form feed does not start a new page
    if pages.len() > 1 && pages.last().is_some_and(|p| p.is_empty()) {
        pages.pop();
    }
    pages
}

impl FormatAdapter for TextAdapter {
    fn load(&self, name: &str, data: &Bytes) -> Result<DocumentModel, FormatError> {
        let text = std::str::from_utf8(data).map_err(|e| FormatError::CorruptDocument {
            reason: format!("'{}' is not valid UTF-8: {}", name, e),
        })?;

        let pages = paginate(text.strip_prefix('\u{FEFF}').unwrap_or(text))
            .into_iter()
            .map(Page::text)
            .collect();
        DocumentModel::new(DocumentFormat::PlainText, pages)
    }
}
