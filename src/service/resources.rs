use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::render::{RenderedPage, Resource};
use crate::storage::DocumentIdentity;

/// Non-embedded resources of rendered pages, by document identity and
/// resource name.
///
/// Populated on every render result, cache hits included, so a resource is
/// resolvable whenever a page referencing it has been returned.
#[derive(Debug, Default)]
pub struct ResourceIndex {
    documents: RwLock<HashMap<DocumentIdentity, HashMap<String, Resource>>>,
}

impl ResourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every resource referenced by `pages`.
    ///
    /// Only the registered version of a document is kept: resources of
    /// other markers under the same id are dropped.
    pub fn register(&self, identity: &DocumentIdentity, pages: &[Arc<RenderedPage>]) {
        if pages.iter().all(|p| p.resources.is_empty()) {
            return;
        }
        let mut documents = self.documents.write();
        documents.retain(|held, _| held.id() != identity.id() || held.marker() == identity.marker());
        let resources = documents.entry(identity.clone()).or_default();
        for resource in pages.iter().flat_map(|p| &p.resources) {
            resources.insert(resource.name.clone(), resource.clone());
        }
    }

    pub fn get(&self, identity: &DocumentIdentity, name: &str) -> Option<Resource> {
        self.documents.read().get(identity)?.get(name).cloned()
    }

    /// Names registered for a document, sorted.
    pub fn names(&self, identity: &DocumentIdentity) -> Vec<String> {
        let mut names: Vec<String> = self
            .documents
            .read()
            .get(identity)
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Forget resources of document `id`, its attachments and every version.
    pub fn remove_document(&self, id: &str) {
        self.documents.write().retain(|identity, _| identity.owner() != id);
    }

    pub fn clear(&self) {
        self.documents.write().clear();
    }

    /// Number of document versions holding resources.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}
