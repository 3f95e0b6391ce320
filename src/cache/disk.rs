//! On-disk artifact store.
//!
//! # Layout
//!
//! ```text
//! root/
//!   {partition}/              one per top-level document (hash of its id)
//!     {key digest}/           one per render key
//!       manifest.json
//!       page_{n}.{html|png|jpg}
//!       page_{n}_res_{i}
//!   .tmp-{digest}-{seq}/      render being written
//! ```
//!
//! A page set is written into a temporary directory and renamed into place,
//! so readers never observe a partial set and a failed write leaves nothing
//! behind. Directories are created on the first save only.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::{ViewerError, ViewerResult};
use crate::render::{ImageEncoding, PageBody, RenderedPage, Resource, ResourceKind};
use crate::storage::partition_for;

use super::key::{CacheEntry, RenderKey};
use super::store::ArtifactStore;

const MANIFEST_FILE: &str = "manifest.json";
const TMP_PREFIX: &str = ".tmp-";
const MANIFEST_VERSION: u32 = 1;

static TMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

// =============================================================================
// Manifest
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    document: String,
    marker: String,
    options: String,
    transforms: String,
    target: String,
    pages: Vec<ManifestPage>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ManifestBody {
    Html,
    Image { encoding: ImageEncoding },
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestPage {
    number: u32,
    position: u32,
    rotation: u16,
    created_at_ms: u64,
    body: ManifestBody,
    file: String,
    resources: Vec<ManifestResource>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestResource {
    name: String,
    kind: ResourceKind,
    mime_type: String,
    file: String,
}

fn cache_io(path: &Path, err: impl std::fmt::Display) -> ViewerError {
    ViewerError::CacheIo(format!("{}: {}", path.display(), err))
}

fn to_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// DiskArtifactStore
// =============================================================================

/// Artifact store persisting page sets under a root directory.
#[derive(Debug, Clone)]
pub struct DiskArtifactStore {
    root: PathBuf,
}

impl DiskArtifactStore {
    /// Store rooted at `root`. Nothing is created until the first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn render_dir(&self, key: &RenderKey) -> PathBuf {
        self.root.join(key.partition()).join(key.digest())
    }

    async fn write_render(&self, dir: &Path, key: &RenderKey, entries: &[CacheEntry]) -> ViewerResult<()> {
        fs::create_dir_all(dir).await.map_err(|e| cache_io(dir, e))?;

        let mut pages = Vec::with_capacity(entries.len());
        for entry in entries {
            let page = &entry.page;
            let (body, data) = match &page.body {
                PageBody::Html(html) => (ManifestBody::Html, Bytes::from(html.clone())),
                PageBody::Image { encoding, data } => (
                    ManifestBody::Image {
                        encoding: *encoding,
                    },
                    data.clone(),
                ),
            };
            let file = format!("page_{}.{}", page.number, page.extension());
            let path = dir.join(&file);
            fs::write(&path, &data).await.map_err(|e| cache_io(&path, e))?;

            let mut resources = Vec::with_capacity(page.resources.len());
            for (i, resource) in page.resources.iter().enumerate() {
                let res_file = format!("page_{}_res_{}", page.number, i);
                let path = dir.join(&res_file);
                fs::write(&path, &resource.data)
                    .await
                    .map_err(|e| cache_io(&path, e))?;
                resources.push(ManifestResource {
                    name: resource.name.clone(),
                    kind: resource.kind,
                    mime_type: resource.mime_type.clone(),
                    file: res_file,
                });
            }

            pages.push(ManifestPage {
                number: page.number,
                position: page.position,
                rotation: page.rotation,
                created_at_ms: to_millis(entry.created_at),
                body,
                file,
                resources,
            });
        }

        let manifest = Manifest {
            version: MANIFEST_VERSION,
            document: key.identity().id().to_string(),
            marker: key.identity().marker().to_string(),
            options: key.options_fingerprint().to_string(),
            transforms: key.transforms_fingerprint().to_string(),
            target: key.target_fingerprint().to_string(),
            pages,
        };
        let json = serde_json::to_vec_pretty(&manifest).map_err(|e| cache_io(dir, e))?;
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, json).await.map_err(|e| cache_io(&path, e))
    }

    /// Move a finished temp directory to `target`, replacing any old set.
    async fn publish(&self, tmp: &Path, target: &Path) -> ViewerResult<()> {
        let parent = target.parent().unwrap_or(&self.root);
        match fs::remove_dir_all(target).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(cache_io(target, e)),
        }

        // A concurrent clear may remove the partition between creating it
        // and renaming into it, so retry once
        let mut last_error = None;
        for _ in 0..2 {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| cache_io(parent, e))?;
            match fs::rename(tmp, target).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = Some(e),
            }
        }
        Err(match last_error {
            Some(e) => cache_io(target, e),
            None => ViewerError::CacheIo(format!("{}: rename failed", target.display())),
        })
    }

    async fn read_render(&self, dir: &Path, manifest: Manifest) -> ViewerResult<Vec<CacheEntry>> {
        let mut entries = Vec::with_capacity(manifest.pages.len());
        for page in manifest.pages {
            let path = dir.join(&page.file);
            let data = fs::read(&path).await.map_err(|e| cache_io(&path, e))?;
            let body = match page.body {
                ManifestBody::Html => PageBody::Html(
                    String::from_utf8(data).map_err(|e| cache_io(&path, e))?,
                ),
                ManifestBody::Image { encoding } => PageBody::Image {
                    encoding,
                    data: Bytes::from(data),
                },
            };

            let mut resources = Vec::with_capacity(page.resources.len());
            for resource in page.resources {
                let path = dir.join(&resource.file);
                let data = fs::read(&path).await.map_err(|e| cache_io(&path, e))?;
                resources.push(Resource::new(
                    resource.name,
                    resource.kind,
                    resource.mime_type,
                    data,
                ));
            }

            entries.push(CacheEntry {
                page: Arc::new(RenderedPage {
                    number: page.number,
                    position: page.position,
                    rotation: page.rotation,
                    body,
                    resources,
                }),
                created_at: UNIX_EPOCH + Duration::from_millis(page.created_at_ms),
            });
        }
        Ok(entries)
    }
}

/// Number of render directories under a partition.
async fn count_renders(partition: &Path) -> usize {
    let Ok(mut dir) = fs::read_dir(partition).await else {
        return 0;
    };
    let mut count = 0;
    while let Ok(Some(entry)) = dir.next_entry().await {
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            count += 1;
        }
    }
    count
}

async fn remove_partition(path: &Path) -> ViewerResult<usize> {
    let count = count_renders(path).await;
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(count),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(cache_io(path, e)),
    }
}

#[async_trait]
impl ArtifactStore for DiskArtifactStore {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn load(&self, key: &RenderKey) -> ViewerResult<Option<Vec<CacheEntry>>> {
        let dir = self.render_dir(key);
        let manifest_path = dir.join(MANIFEST_FILE);
        let raw = match fs::read(&manifest_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(cache_io(&manifest_path, e)),
        };

        let manifest: Manifest =
            serde_json::from_slice(&raw).map_err(|e| cache_io(&manifest_path, e))?;
        if manifest.version != MANIFEST_VERSION
            || manifest.document != key.identity().id()
            || manifest.marker != key.identity().marker()
        {
            return Ok(None);
        }

        self.read_render(&dir, manifest).await.map(Some)
    }

    async fn save(&self, key: &RenderKey, entries: &[CacheEntry]) -> ViewerResult<()> {
        let digest = key.digest();
        let seq = TMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .root
            .join(format!("{}{}-{}-{}", TMP_PREFIX, digest, std::process::id(), seq));
        let target = self.render_dir(key);

        let result = match self.write_render(&tmp, key, entries).await {
            Ok(()) => self.publish(&tmp, &target).await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            let _ = fs::remove_dir_all(&tmp).await;
        }
        result?;

        debug!(key = %key, path = %target.display(), pages = entries.len(), "Saved render to disk store");
        Ok(())
    }

    async fn clear(&self, document: Option<&str>) -> ViewerResult<usize> {
        if let Some(id) = document {
            return remove_partition(&self.root.join(partition_for(id))).await;
        }

        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(cache_io(&self.root, e)),
        };

        let mut removed = 0;
        while let Some(entry) = dir.next_entry().await.map_err(|e| cache_io(&self.root, e))? {
            // Renders being written belong to in-flight saves
            if entry.file_name().to_string_lossy().starts_with(TMP_PREFIX) {
                continue;
            }
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .map_err(|e| cache_io(&entry.path(), e))?;
            if is_dir {
                removed += remove_partition(&entry.path()).await?;
            }
        }
        Ok(removed)
    }
}
