use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::target::ImageEncoding;

/// Kind of a page resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Style,
    Font,
}

/// Named payload referenced from a page's HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub kind: ResourceKind,
    pub mime_type: String,
    pub data: Bytes,
}

impl Resource {
    pub fn new(
        name: impl Into<String>,
        kind: ResourceKind,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// Rendered content of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageBody {
    Html(String),
    Image { encoding: ImageEncoding, data: Bytes },
}

/// One page of render output. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Original page number, stable across reorders
    pub number: u32,

    /// 1-based presentation position after reordering
    pub position: u32,

    /// Rotation applied, in degrees
    pub rotation: u16,

    pub body: PageBody,

    /// Resources referenced by the HTML, in reference order. Empty when
    /// resources are embedded or the page is an image.
    pub resources: Vec<Resource>,
}

impl RenderedPage {
    /// Page content as bytes.
    pub fn content(&self) -> Bytes {
        match &self.body {
            PageBody::Html(html) => Bytes::from(html.clone()),
            PageBody::Image { data, .. } => data.clone(),
        }
    }

    pub fn html(&self) -> Option<&str> {
        match &self.body {
            PageBody::Html(html) => Some(html),
            PageBody::Image { .. } => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match &self.body {
            PageBody::Html(_) => "text/html; charset=utf-8",
            PageBody::Image { encoding, .. } => encoding.mime_type(),
        }
    }

    pub fn extension(&self) -> &'static str {
        match &self.body {
            PageBody::Html(_) => "html",
            PageBody::Image { encoding, .. } => encoding.extension(),
        }
    }

    /// Conventional file name, `page_{number}.{ext}`.
    pub fn file_name(&self) -> String {
        format!("page_{}.{}", self.number, self.extension())
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Approximate memory footprint, used for cache accounting.
    pub fn size_bytes(&self) -> usize {
        let body = match &self.body {
            PageBody::Html(html) => html.len(),
            PageBody::Image { data, .. } => data.len(),
        };
        body + self
            .resources
            .iter()
            .map(|r| r.data.len() + r.name.len())
            .sum::<usize>()
    }
}
