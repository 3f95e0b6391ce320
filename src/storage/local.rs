//! Filesystem-backed document source.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

use super::source::{file_name, DocumentIdentity, DocumentSource, SourceDocument};

/// Document source rooted at a storage directory.
///
/// Identifiers are paths relative to the root; absolute paths are accepted
/// when they resolve inside the root. The identity uses the root-relative
/// path, so both spellings map to the same cache partition. The marker is
/// `{mtime_nanos}-{size}`.
#[derive(Debug, Clone)]
pub struct LocalDocumentSource {
    root: PathBuf,
}

impl LocalDocumentSource {
    /// Create a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an identifier to a canonical path inside the root, returning
    /// the path and its root-relative identifier.
    async fn resolve(&self, document_id: &str) -> Result<(PathBuf, String), StorageError> {
        let root = tokio::fs::canonicalize(&self.root).await?;
        let candidate = root.join(document_id);

        let path = match tokio::fs::canonicalize(&candidate).await {
            Ok(path) => path,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(document_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let relative = path
            .strip_prefix(&root)
            .map_err(|_| StorageError::InvalidIdentifier(document_id.to_string()))?;
        let id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        Ok((path, id))
    }
}

#[async_trait]
impl DocumentSource for LocalDocumentSource {
    async fn identify(&self, document_id: &str) -> Result<DocumentIdentity, StorageError> {
        let (path, id) = self.resolve(document_id).await?;
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(document_id.to_string()));
        }

        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        Ok(DocumentIdentity::new(
            id,
            format!("{}-{}", modified, metadata.len()),
        ))
    }

    async fn open(&self, document_id: &str) -> Result<SourceDocument, StorageError> {
        let (path, _) = self.resolve(document_id).await?;
        let data = tokio::fs::read(&path).await?;
        // Stat after reading: a write racing the read yields a newer marker
        let identity = self.identify(document_id).await?;

        Ok(SourceDocument {
            name: file_name(identity.id()).to_string(),
            identity,
            data: Bytes::from(data),
        })
    }
}
