//! RFC 822 e-mail adapter (`.eml`).
//!
//! The first page starts with the From/To/Subject/Date summary followed by
//! the plain-text body. MIME parts carrying a file name become
//! [`Attachment`]s.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use crate::error::FormatError;

use super::adapter::{Attachment, DocumentModel, FormatAdapter, Page};
use super::detect::DocumentFormat;
use super::text::paginate;

/// Headers shown at the top of the first page, in display order.
const SUMMARY_HEADERS: [&str; 4] = ["From", "To", "Subject", "Date"];

/// Adapter for `.eml` messages.
#[derive(Debug, Clone, Default)]
pub struct EmailAdapter;

impl EmailAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// A header block plus body, for the message itself and each MIME part.
#[derive(Debug)]
struct Part<'a> {
    headers: Vec<(String, String)>,
    body: &'a str,
}

impl Part<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn content_type(&self) -> String {
        self.header("Content-Type")
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .unwrap_or_else(|| "text/plain".to_string())
    }

    fn file_name(&self) -> Option<String> {
        self.header("Content-Disposition")
            .and_then(|v| header_param(v, "filename"))
            .or_else(|| self.header("Content-Type").and_then(|v| header_param(v, "name")))
    }

    fn decoded_body(&self) -> Result<Vec<u8>, FormatError> {
        let encoding = self
            .header("Content-Transfer-Encoding")
            .map(|v| v.trim().to_ascii_lowercase());
        match encoding.as_deref() {
            Some("base64") => {
                let compact: String = self.body.split_whitespace().collect();
                STANDARD
                    .decode(compact)
                    .map_err(|e| FormatError::CorruptDocument {
                        reason: format!("invalid base64 MIME part: {}", e),
                    })
            }
            _ => Ok(self.body.as_bytes().to_vec()),
        }
    }
}

/// Split a header block from its body, unfolding continuation lines.
fn parse_part(raw: &str) -> Part<'_> {
    let (head, body) = match raw.find("\r\n\r\n") {
        Some(i) => (&raw[..i], &raw[i + 4..]),
        None => match raw.find("\n\n") {
            Some(i) => (&raw[..i], &raw[i + 2..]),
            None => (raw, ""),
        },
    };

    let mut headers: Vec<(String, String)> = Vec::new();
    for line in head.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    Part { headers, body }
}

/// Value of `param` in a header like `attachment; filename="a.pdf"`.
fn header_param(value: &str, param: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|p| {
        let (key, val) = p.split_once('=')?;
        if key.trim().eq_ignore_ascii_case(param) {
            Some(val.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

/// Bodies of each part between `--boundary` delimiters.
fn split_multipart<'a>(body: &'a str, boundary: &str) -> Vec<&'a str> {
    let delimiter = format!("--{}", boundary);
    let closing = format!("--{}--", boundary);
    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == delimiter || trimmed == closing {
            if let Some(start) = current {
                parts.push(body[start..offset].trim_end_matches(['\r', '\n']));
            }
            current = if trimmed == closing { None } else { Some(offset + line.len()) };
            if trimmed == closing {
                break;
            }
        }
        offset += line.len();
    }
    parts
}

struct Collected {
    text: Vec<String>,
    attachments: Vec<Attachment>,
}

fn collect(part: &Part<'_>, out: &mut Collected) -> Result<(), FormatError> {
    let content_type = part.content_type();

    if content_type.starts_with("multipart/") {
        let boundary = part
            .header("Content-Type")
            .and_then(|v| header_param(v, "boundary"))
            .ok_or_else(|| FormatError::CorruptDocument {
                reason: "multipart message without boundary".to_string(),
            })?;
        for raw in split_multipart(part.body, &boundary) {
            collect(&parse_part(raw), out)?;
        }
        return Ok(());
    }

    if let Some(name) = part.file_name() {
        out.attachments.push(Attachment {
            name,
            mime_type: Some(content_type),
            data: Bytes::from(part.decoded_body()?),
        });
    } else if content_type == "text/plain" {
        let body = part.decoded_body()?;
        out.text.push(String::from_utf8_lossy(&body).into_owned());
    }
    Ok(())
}

impl FormatAdapter for EmailAdapter {
    fn load(&self, name: &str, data: &Bytes) -> Result<DocumentModel, FormatError> {
        let raw = std::str::from_utf8(data).map_err(|e| FormatError::CorruptDocument {
            reason: format!("'{}' is not valid UTF-8: {}", name, e),
        })?;

        let message = parse_part(raw);
        if message.headers.is_empty() {
            return Err(FormatError::CorruptDocument {
                reason: format!("'{}' has no message headers", name),
            });
        }

        let mut collected = Collected {
            text: Vec::new(),
            attachments: Vec::new(),
        };
        collect(&message, &mut collected)?;

        let mut rendered = String::new();
        for header in SUMMARY_HEADERS {
            if let Some(value) = message.header(header) {
                rendered.push_str(&format!("{}: {}\n", header, value));
            }
        }
        rendered.push('\n');
        rendered.push_str(&collected.text.join("\n"));

        let pages = paginate(&rendered).into_iter().map(Page::text).collect();
        Ok(DocumentModel::new(DocumentFormat::Email, pages)?.with_attachments(collected.attachments))
    }
}
