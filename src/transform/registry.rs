use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::ViewerResult;
use crate::storage::DocumentIdentity;

use super::state::PageTransformState;

/// Process-wide transform state, one entry per document identity.
///
/// Mutations take the write lock for their whole duration, so concurrent
/// rotate/reorder calls on one document are serialized. Readers get a
/// cloned snapshot.
#[derive(Debug, Default)]
pub struct TransformRegistry {
    states: RwLock<HashMap<DocumentIdentity, PageTransformState>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutate<F>(&self, identity: &DocumentIdentity, page_count: u32, f: F) -> ViewerResult<()>
    where
        F: FnOnce(&mut PageTransformState) -> ViewerResult<()>,
    {
        let mut states = self.states.write();
        let mut state = states
            .get(identity)
            .filter(|s| s.page_count() == page_count)
            .cloned()
            .unwrap_or_else(|| PageTransformState::identity(page_count));

        // Only commit on success so a rejected call leaves no trace
        f(&mut state)?;
        states.insert(identity.clone(), state);
        Ok(())
    }

    /// Set the rotation of original page `page`.
    pub fn rotate(
        &self,
        identity: &DocumentIdentity,
        page_count: u32,
        page: u32,
        angle: i32,
    ) -> ViewerResult<()> {
        self.mutate(identity, page_count, |state| state.rotate(page, angle))?;
        debug!(document = %identity, page, angle, "Page rotated");
        Ok(())
    }

    /// Move the page at position `current` to position `new`.
    pub fn reorder(
        &self,
        identity: &DocumentIdentity,
        page_count: u32,
        current: u32,
        new: u32,
    ) -> ViewerResult<()> {
        self.mutate(identity, page_count, |state| state.reorder(current, new))?;
        debug!(document = %identity, current, new, "Page reordered");
        Ok(())
    }

    /// Consistent copy of the state, if any transform was registered.
    pub fn snapshot(&self, identity: &DocumentIdentity) -> Option<PageTransformState> {
        self.states.read().get(identity).cloned()
    }

    pub fn contains(&self, identity: &DocumentIdentity) -> bool {
        self.states.read().contains_key(identity)
    }

    /// Drop state for every version of document `id` and its attachments.
    /// Returns the number removed.
    pub fn remove_document(&self, id: &str) -> usize {
        let mut states = self.states.write();
        let before = states.len();
        states.retain(|identity, _| identity.owner() != id);
        before - states.len()
    }

    /// Drop all state.
    pub fn clear(&self) -> usize {
        let mut states = self.states.write();
        let removed = states.len();
        states.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}
