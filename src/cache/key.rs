use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use sha2::{Digest, Sha256};

use crate::render::{RenderOptions, RenderTarget, RenderedPage};
use crate::storage::DocumentIdentity;
use crate::transform::PageTransformState;

// =============================================================================
// Render Key
// =============================================================================

/// Identifies one render: document identity plus the fingerprints of the
/// options, the effective transform state and the target.
///
/// Transform state is part of the key so rotating or reordering a page
/// never serves artifacts rendered before the edit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderKey {
    identity: DocumentIdentity,
    options: Arc<str>,
    transforms: Arc<str>,
    target: Arc<str>,
}

impl RenderKey {
    /// `transforms` must be the view honouring `options.transformations`.
    pub fn new(
        identity: DocumentIdentity,
        options: &RenderOptions,
        transforms: &PageTransformState,
        target: &RenderTarget,
    ) -> Self {
        Self::from_parts(
            identity,
            options.fingerprint(),
            transforms.fingerprint(),
            target.fingerprint(),
        )
    }

    pub fn from_parts(
        identity: DocumentIdentity,
        options: impl Into<Arc<str>>,
        transforms: impl Into<Arc<str>>,
        target: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            identity,
            options: options.into(),
            transforms: transforms.into(),
            target: target.into(),
        }
    }

    pub fn identity(&self) -> &DocumentIdentity {
        &self.identity
    }

    pub fn options_fingerprint(&self) -> &str {
        &self.options
    }

    pub fn transforms_fingerprint(&self) -> &str {
        &self.transforms
    }

    pub fn target_fingerprint(&self) -> &str {
        &self.target
    }

    /// Storage partition shared by every render of the document.
    pub fn partition(&self) -> String {
        self.identity.partition()
    }

    /// Hex digest unique to this key, used as a storage directory name.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.identity.id(),
            self.identity.marker(),
            &*self.options,
            &*self.transforms,
            &*self.target,
        ] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hex::encode(&hasher.finalize()[..20])
    }
}

impl fmt::Display for RenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}/{}/{}",
            self.identity,
            &self.options[..self.options.len().min(12)],
            self.transforms,
            self.target
        )
    }
}

// =============================================================================
// Cache Entry
// =============================================================================

/// One cached page. Write-once: entries are replaced, never mutated.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub page: Arc<RenderedPage>,
    pub created_at: SystemTime,
}

impl CacheEntry {
    pub fn new(page: Arc<RenderedPage>) -> Self {
        Self {
            page,
            created_at: SystemTime::now(),
        }
    }

    /// Original page number; with the render key this forms the entry key.
    pub fn page_number(&self) -> u32 {
        self.page.number
    }

    /// Number of handles to the page held outside this entry.
    pub fn readers(&self) -> usize {
        Arc::strong_count(&self.page).saturating_sub(1)
    }
}
