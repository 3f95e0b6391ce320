//! The viewer service and its helpers.

mod export;
mod resources;
mod viewer;

pub use export::{export_pages, RESOURCES_DIR};
pub use resources::ResourceIndex;
pub use viewer::{AttachmentInfo, DocumentInfo, PageInfo, PageSet, ViewerService};
