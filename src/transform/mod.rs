//! Page-level transformations (rotate, reorder) applied before rendering.
//!
//! State lives in a [`TransformRegistry`] keyed by document identity. It is
//! created by the first rotate/reorder call for a document and torn down
//! when that document's cache is cleared. Renders read a cloned snapshot.

mod registry;
mod state;

pub use registry::TransformRegistry;
pub use state::{normalize_angle, PageTransformState, Transformations};
