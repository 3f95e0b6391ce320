use async_trait::async_trait;

use crate::error::ViewerResult;

use super::key::{CacheEntry, RenderKey};

/// Persistence contract for rendered artifacts.
///
/// Entries are stored per [`RenderKey`] as a complete page set; a store
/// never exposes a partial set.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Stored entries for `key`, in presentation order.
    async fn load(&self, key: &RenderKey) -> ViewerResult<Option<Vec<CacheEntry>>>;

    /// Store the complete page set for `key`, replacing any previous one.
    async fn save(&self, key: &RenderKey, entries: &[CacheEntry]) -> ViewerResult<()>;

    /// Remove entries for document `id` (every version), or everything
    /// when `None`. Returns the number of render keys removed.
    async fn clear(&self, document: Option<&str>) -> ViewerResult<usize>;
}
