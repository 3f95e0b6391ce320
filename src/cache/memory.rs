//! In-process artifact store with size-based LRU eviction.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::ViewerResult;

use super::key::{CacheEntry, RenderKey};
use super::store::ArtifactStore;

/// Default capacity: 256MB
pub const DEFAULT_MEMORY_CAPACITY: usize = 256 * 1024 * 1024;

/// Maximum number of render keys held (bounds LRU overhead)
const DEFAULT_MAX_RENDERS: usize = 4_096;

struct Inner {
    renders: LruCache<RenderKey, Vec<CacheEntry>>,
    current_size: usize,
}

fn entries_size(entries: &[CacheEntry]) -> usize {
    entries.iter().map(|e| e.page.size_bytes()).sum()
}

/// LRU store keeping complete page sets in memory.
///
/// The total size of stored pages is tracked and least-recently-used page
/// sets are evicted once it exceeds `max_size`.
pub struct MemoryArtifactStore {
    inner: Mutex<Inner>,
    max_size: usize,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }

    /// Store holding at most `max_size` bytes of pages.
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                renders: LruCache::new(
                    NonZeroUsize::new(DEFAULT_MAX_RENDERS).unwrap_or(NonZeroUsize::MIN),
                ),
                current_size: 0,
            }),
            max_size,
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Total bytes of stored pages.
    pub fn size(&self) -> usize {
        self.inner.lock().current_size
    }

    /// Number of stored render keys.
    pub fn len(&self) -> usize {
        self.inner.lock().renders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().renders.is_empty()
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, key: &RenderKey) -> ViewerResult<Option<Vec<CacheEntry>>> {
        Ok(self.inner.lock().renders.get(key).cloned())
    }

    async fn save(&self, key: &RenderKey, entries: &[CacheEntry]) -> ViewerResult<()> {
        let size = entries_size(entries);
        let mut inner = self.inner.lock();

        // push hands back the replaced set for this key, or the set evicted
        // by the entry bound
        if let Some((_, displaced)) = inner.renders.push(key.clone(), entries.to_vec()) {
            let displaced_size = entries_size(&displaced);
            inner.current_size = inner.current_size.saturating_sub(displaced_size);
        }
        inner.current_size += size;

        while inner.current_size > self.max_size {
            match inner.renders.pop_lru() {
                Some((evicted_key, evicted)) => {
                    let evicted_size = entries_size(&evicted);
                    inner.current_size = inner.current_size.saturating_sub(evicted_size);
                    debug!(key = %evicted_key, bytes = evicted_size, "Evicted render from memory store");
                }
                None => {
                    inner.current_size = 0;
                    break;
                }
            }
        }
        Ok(())
    }

    async fn clear(&self, document: Option<&str>) -> ViewerResult<usize> {
        let mut inner = self.inner.lock();
        let Some(id) = document else {
            let removed = inner.renders.len();
            inner.renders.clear();
            inner.current_size = 0;
            return Ok(removed);
        };

        let doomed: Vec<RenderKey> = inner
            .renders
            .iter()
            .filter(|(k, _)| k.identity().owner() == id)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            if let Some(entries) = inner.renders.pop(key) {
                let size = entries_size(&entries);
                inner.current_size = inner.current_size.saturating_sub(size);
            }
        }
        Ok(doomed.len())
    }
}
