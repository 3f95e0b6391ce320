//! Document formats: detection, the adapter contract and built-in adapters.
//!
//! ```text
//! ┌──────────────┐   detect_format   ┌─────────────────┐   load   ┌───────────────┐
//! │ name + bytes │ ────────────────► │ AdapterRegistry │ ───────► │ DocumentModel │
//! └──────────────┘                   └─────────────────┘          └───────────────┘
//! ```
//!
//! Office and PDF parsing is not built in; such adapters plug in through
//! [`AdapterRegistry::register`].

mod adapter;
mod detect;
mod email;
mod raster;
mod text;

pub use adapter::{
    AdapterRegistry, Attachment, DocumentModel, FormatAdapter, Page, PageContent,
    DEFAULT_PAGE_HEIGHT, DEFAULT_PAGE_WIDTH,
};
pub use detect::{detect_format, extension_of, DocumentFormat, DETECTION_HEADER_BYTES};
pub use email::EmailAdapter;
pub use raster::RasterAdapter;
pub use text::{TextAdapter, LINES_PER_PAGE};
