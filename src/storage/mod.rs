//! Document storage layer.
//!
//! The viewer never reads documents directly. It goes through a
//! [`DocumentSource`], which resolves a caller-supplied identifier into a
//! [`DocumentIdentity`] (identifier + modification marker) and, on a cache
//! miss, into the document bytes.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              ViewerService              │
//! └────────────────────┬────────────────────┘
//!                      │ identify / open
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          DocumentSource Trait           │
//! └────────────────────┬────────────────────┘
//!          ┌───────────┼───────────┐
//!          ▼           ▼           ▼
//!   LocalDocument  MemoryDocument  S3Document
//!      Source         Source         Source
//! ```

mod local;
mod s3;
mod source;

pub use local::LocalDocumentSource;
pub use s3::{create_s3_client, S3DocumentSource};
pub(crate) use source::partition_for;
pub use source::{DocumentIdentity, DocumentSource, MemoryDocumentSource, SourceDocument};
