//! Document identity and the `DocumentSource` trait.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::error::StorageError;

// =============================================================================
// Document Identity
// =============================================================================

/// Stable identity of a source document.
///
/// Two requests carrying the same `id` and `marker` observe the same cached
/// artifacts. The marker changes whenever the underlying content changes
/// (mtime, content hash, ETag, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentIdentity {
    id: Arc<str>,
    marker: Arc<str>,
    owner: Arc<str>,
}

impl DocumentIdentity {
    /// Create a new identity.
    pub fn new(id: impl Into<Arc<str>>, marker: impl Into<Arc<str>>) -> Self {
        let id = id.into();
        Self {
            owner: id.clone(),
            id,
            marker: marker.into(),
        }
    }

    /// Identity of an attachment embedded in `parent`.
    ///
    /// The id is `"{parent}!{attachment}"`; the marker is the parent's, and
    /// the attachment lives in the parent's partition.
    pub fn for_attachment(parent: &DocumentIdentity, attachment: &str) -> Self {
        Self {
            id: format!("{}!{}", parent.id, attachment).into(),
            marker: parent.marker.clone(),
            owner: parent.owner.clone(),
        }
    }

    /// Top-level document this identity belongs to (itself unless it is
    /// an attachment).
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The caller-facing document identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The last-modified marker.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Filesystem-safe partition name derived from the identifier only.
    ///
    /// All versions of a document share a partition, so evicting a document
    /// removes every cached version at once.
    pub fn partition(&self) -> String {
        partition_for(&self.owner)
    }
}

impl fmt::Display for DocumentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.marker)
    }
}

/// Partition name for a raw document identifier.
pub(crate) fn partition_for(id: &str) -> String {
    let digest = Sha256::digest(id.as_bytes());
    hex::encode(&digest[..16])
}

// =============================================================================
// Source Document
// =============================================================================

/// A document opened from storage.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Identity at the time the document was read
    pub identity: DocumentIdentity,

    /// File name used for format detection (e.g. `report.docx`)
    pub name: String,

    /// Raw document bytes
    pub data: Bytes,
}

// =============================================================================
// DocumentSource Trait
// =============================================================================

/// Resolves document identifiers into identities and content.
///
/// This abstraction keeps the viewer independent of where documents live
/// (local disk, S3, in-memory handles).
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Resolve the identity of a document without reading its content.
    ///
    /// Called on every request, so implementations should only consult
    /// metadata (stat, HEAD, hash of an in-memory handle).
    async fn identify(&self, document_id: &str) -> Result<DocumentIdentity, StorageError>;

    /// Read the full document.
    async fn open(&self, document_id: &str) -> Result<SourceDocument, StorageError>;
}

#[async_trait]
impl<T: DocumentSource + ?Sized> DocumentSource for Arc<T> {
    async fn identify(&self, document_id: &str) -> Result<DocumentIdentity, StorageError> {
        (**self).identify(document_id).await
    }

    async fn open(&self, document_id: &str) -> Result<SourceDocument, StorageError> {
        (**self).open(document_id).await
    }
}

// =============================================================================
// In-memory Source
// =============================================================================

/// In-memory document source for content handles.
///
/// The modification marker is the SHA-256 of the content, so replacing a
/// document with different bytes yields a new identity.
#[derive(Default)]
pub struct MemoryDocumentSource {
    documents: RwLock<HashMap<String, (Bytes, Arc<str>)>>,
}

impl MemoryDocumentSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with_document(self, document_id: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(document_id, data);
        self
    }

    /// Insert or replace a document.
    pub fn insert(&self, document_id: impl Into<String>, data: impl Into<Bytes>) {
        let data = data.into();
        let marker: Arc<str> = hex::encode(Sha256::digest(&data)).into();
        self.documents
            .write()
            .insert(document_id.into(), (data, marker));
    }

    /// Remove a document.
    pub fn remove(&self, document_id: &str) -> bool {
        self.documents.write().remove(document_id).is_some()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Whether the source holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl DocumentSource for MemoryDocumentSource {
    async fn identify(&self, document_id: &str) -> Result<DocumentIdentity, StorageError> {
        let documents = self.documents.read();
        let (_, marker) = documents
            .get(document_id)
            .ok_or_else(|| StorageError::NotFound(document_id.to_string()))?;
        Ok(DocumentIdentity::new(document_id, marker.clone()))
    }

    async fn open(&self, document_id: &str) -> Result<SourceDocument, StorageError> {
        let documents = self.documents.read();
        let (data, marker) = documents
            .get(document_id)
            .ok_or_else(|| StorageError::NotFound(document_id.to_string()))?;
        Ok(SourceDocument {
            identity: DocumentIdentity::new(document_id, marker.clone()),
            name: file_name(document_id).to_string(),
            data: data.clone(),
        })
    }
}

/// Last path component of an identifier.
pub(crate) fn file_name(document_id: &str) -> &str {
    document_id
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(document_id)
}

// =============================================================================
// Tests
// =============================================================================
