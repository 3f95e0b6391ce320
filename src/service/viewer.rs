//! ViewerService: the public entry point of the library.
//!
//! ```text
//! get_pages(id, options)
//!   │
//!   ├─ LicenseGate::check
//!   ├─ DocumentSource::identify ──► RenderKey (identity + options + transforms + target)
//!   ├─ ArtifactCache::get_or_render
//!   │     hit ──► stored pages
//!   │     miss ─► open ─► FormatAdapter::load ─► RenderPipeline::render ─► store
//!   └─ ResourceIndex::register
//! ```

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{ArtifactCache, RenderKey, RenderOutput};
use crate::config::ViewerConfig;
use crate::error::{StorageError, ViewerError, ViewerResult};
use crate::format::{detect_format, AdapterRegistry, DocumentFormat, DocumentModel, DETECTION_HEADER_BYTES};
use crate::license::LicenseGate;
use crate::render::{CancellationToken, RenderOptions, RenderPipeline, RenderTarget, RenderedPage, Resource};
use crate::storage::{DocumentIdentity, DocumentSource};
use crate::transform::{PageTransformState, TransformRegistry};

use super::resources::ResourceIndex;

// =============================================================================
// Result Types
// =============================================================================

/// Rendered pages plus whether this call avoided rendering.
#[derive(Debug, Clone)]
pub struct PageSet {
    pub pages: Vec<Arc<RenderedPage>>,
    pub cache_hit: bool,
}

/// Page entry of [`DocumentInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// Original page number
    pub number: u32,
    /// Presentation position
    pub position: u32,
    pub width: u32,
    pub height: u32,
    pub rotation: u16,
}

/// Attachment entry of [`DocumentInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentInfo {
    pub name: String,
    pub file_type: Option<String>,
    pub mime_type: Option<String>,
    pub size: usize,
}

/// Document metadata, read without rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub id: String,
    pub name: String,
    pub format: DocumentFormat,
    pub page_count: u32,
    /// Pages in presentation order
    pub pages: Vec<PageInfo>,
    pub attachments: Vec<AttachmentInfo>,
}

/// Cancels the token if the render future is dropped before completion.
struct CancelOnDrop(Option<CancellationToken>);

impl CancelOnDrop {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.0.take() {
            token.cancel();
        }
    }
}

/// Run CPU-bound work off the async executor.
async fn run_blocking<T, F>(f: F) -> ViewerResult<T>
where
    F: FnOnce() -> ViewerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ViewerError::Internal(format!("worker task failed: {}", e)))?
}

/// Detect the format of `data` and load it with the matching adapter.
fn load_model(adapters: &AdapterRegistry, name: &str, data: &Bytes) -> ViewerResult<DocumentModel> {
    let head = &data[..data.len().min(DETECTION_HEADER_BYTES)];
    let format = detect_format(name, head)?;
    let adapter = adapters.adapter_for(format)?;
    Ok(adapter.load(name, data)?)
}

// =============================================================================
// ViewerService
// =============================================================================

/// Renders documents from a [`DocumentSource`] into cached pages.
///
/// Safe to share across tasks behind an `Arc`; concurrent requests for
/// the same document, options and target share one render.
pub struct ViewerService<S: DocumentSource> {
    source: S,
    license: Arc<dyn LicenseGate>,
    adapters: Arc<AdapterRegistry>,
    pipeline: RenderPipeline,
    transforms: TransformRegistry,
    cache: ArtifactCache,
    resources: ResourceIndex,
    default_target: RenderTarget,
}

impl<S: DocumentSource> ViewerService<S> {
    /// Service with built-in adapters, the built-in renderer and an
    /// in-memory cache.
    pub fn new(source: S, license: Arc<dyn LicenseGate>) -> Self {
        Self::with_config(source, license, &ViewerConfig::default())
    }

    /// Service with the cache and default target of `config`.
    pub fn with_config(source: S, license: Arc<dyn LicenseGate>, config: &ViewerConfig) -> Self {
        Self {
            source,
            license,
            adapters: Arc::new(AdapterRegistry::with_builtin()),
            pipeline: RenderPipeline::builtin(),
            transforms: TransformRegistry::new(),
            cache: config.build_cache(),
            resources: ResourceIndex::new(),
            default_target: config.default_target,
        }
    }

    /// Replace the format adapters.
    pub fn with_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = Arc::new(adapters);
        self
    }

    /// Replace the render pipeline (e.g. with an external page renderer).
    pub fn with_pipeline(mut self, pipeline: RenderPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Replace the artifact cache.
    pub fn with_cache(mut self, cache: ArtifactCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub fn default_target(&self) -> RenderTarget {
        self.default_target
    }

    /// Resolve `id`, accepting `"{document}!{attachment}"` for attachments.
    async fn resolve_identity(&self, id: &str) -> ViewerResult<DocumentIdentity> {
        match self.source.identify(id).await {
            Ok(identity) => Ok(identity),
            Err(StorageError::NotFound(_)) if id.contains('!') => {
                let (parent, attachment) = id.rsplit_once('!').unwrap_or((id, ""));
                let parent = self.source.identify(parent).await?;
                Ok(DocumentIdentity::for_attachment(&parent, attachment))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Open and parse a top-level document.
    ///
    /// Returns the identity the content was read at, the document name and
    /// the model.
    async fn open_model(&self, id: &str) -> ViewerResult<(DocumentIdentity, String, DocumentModel)> {
        let document = self.source.open(id).await?;
        let adapters = self.adapters.clone();
        let identity = document.identity.clone();
        let name = document.name.clone();
        let model = run_blocking(move || load_model(&adapters, &document.name, &document.data)).await?;
        Ok((identity, name, model))
    }

    /// Wrap rendered pages, refusing to cache them when the document changed
    /// between identification and reading.
    fn checked_output(
        expected: &DocumentIdentity,
        read: &DocumentIdentity,
        pages: Vec<RenderedPage>,
    ) -> RenderOutput {
        if read == expected {
            return pages.into();
        }
        warn!(
            expected = %expected,
            read = %read,
            "Document changed while rendering, result not cached"
        );
        RenderOutput::uncached(pages)
    }

    fn render_key(
        &self,
        identity: &DocumentIdentity,
        state: Option<&PageTransformState>,
        options: &RenderOptions,
        target: &RenderTarget,
    ) -> RenderKey {
        let transforms = state
            .map(|s| s.effective(options.transformations).fingerprint())
            .unwrap_or_else(|| "identity".to_string());
        RenderKey::from_parts(
            identity.clone(),
            options.fingerprint(),
            transforms,
            target.fingerprint(),
        )
    }

    /// Render pages of `model` on a blocking worker.
    async fn render_model(
        &self,
        model: DocumentModel,
        state: Option<PageTransformState>,
        options: RenderOptions,
        target: RenderTarget,
        cancel: CancellationToken,
    ) -> ViewerResult<Vec<RenderedPage>> {
        let pipeline = self.pipeline.clone();
        let guard = CancelOnDrop(Some(cancel.clone()));
        let result = run_blocking(move || {
            let state = state.unwrap_or_else(|| PageTransformState::identity(model.page_count()));
            pipeline.render(&model, &state, &options, &target, &cancel)
        })
        .await;
        guard.disarm();
        result
    }

    /// Render pages with the default target.
    ///
    /// Pages come back in presentation order, numbered by original page.
    pub async fn get_pages(
        &self,
        document_id: &str,
        options: Option<&RenderOptions>,
    ) -> ViewerResult<Vec<Arc<RenderedPage>>> {
        let options = options.cloned().unwrap_or_default();
        let set = self
            .render_pages(document_id, &options, &self.default_target, &CancellationToken::new())
            .await?;
        Ok(set.pages)
    }

    /// Render pages for an explicit target.
    ///
    /// `cancel` aborts the render between pages when this call leads it;
    /// callers joining another caller's render share that render's fate.
    pub async fn render_pages(
        &self,
        document_id: &str,
        options: &RenderOptions,
        target: &RenderTarget,
        cancel: &CancellationToken,
    ) -> ViewerResult<PageSet> {
        self.license.check()?;
        options.validate()?;

        let identity = self.source.identify(document_id).await?;
        let state = self.transforms.snapshot(&identity);
        let key = self.render_key(&identity, state.as_ref(), options, target);

        let started = Instant::now();
        let lookup = self
            .cache
            .get_or_render(&key, || async {
                let (read, _, model) = self.open_model(document_id).await?;
                let pages = self
                    .render_model(model, state.clone(), options.clone(), *target, cancel.clone())
                    .await?;
                info!(
                    document = %identity,
                    pages = pages.len(),
                    target = %target.fingerprint(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Rendered document"
                );
                Ok(Self::checked_output(&identity, &read, pages))
            })
            .await?;

        self.resources.register(&identity, &lookup.pages);
        Ok(PageSet {
            cache_hit: lookup.cache_hit(),
            pages: lookup.pages,
        })
    }

    /// Render an attachment of `document_id` through the same cache path.
    pub async fn get_attachment_pages(
        &self,
        document_id: &str,
        attachment: &str,
        options: &RenderOptions,
        target: &RenderTarget,
    ) -> ViewerResult<PageSet> {
        self.license.check()?;
        options.validate()?;

        let parent = self.source.identify(document_id).await?;
        let identity = DocumentIdentity::for_attachment(&parent, attachment);
        let state = self.transforms.snapshot(&identity);
        let key = self.render_key(&identity, state.as_ref(), options, target);

        let lookup = self
            .cache
            .get_or_render(&key, || async {
                let (read, _, parent_model) = self.open_model(document_id).await?;
                let found = parent_model.attachment(attachment).cloned().ok_or_else(|| {
                    ViewerError::AttachmentNotFound {
                        document: document_id.to_string(),
                        attachment: attachment.to_string(),
                    }
                })?;

                let adapters = self.adapters.clone();
                let model = run_blocking(move || load_model(&adapters, &found.name, &found.data)).await?;
                debug!(document = %identity, pages = model.page_count(), "Loaded attachment");
                let pages = self
                    .render_model(model, state.clone(), options.clone(), *target, CancellationToken::new())
                    .await?;
                Ok(Self::checked_output(&parent, &read, pages))
            })
            .await?;

        self.resources.register(&identity, &lookup.pages);
        Ok(PageSet {
            cache_hit: lookup.cache_hit(),
            pages: lookup.pages,
        })
    }

    /// Resolve a non-embedded resource returned with a rendered page.
    pub async fn get_resource(&self, document_id: &str, name: &str) -> ViewerResult<Resource> {
        self.license.check()?;
        let identity = self.resolve_identity(document_id).await?;
        self.resources
            .get(&identity, name)
            .ok_or_else(|| ViewerError::ResourceNotFound {
                document: document_id.to_string(),
                resource: name.to_string(),
            })
    }

    /// Document metadata read through the format adapter, without rendering.
    pub async fn get_document_info(&self, document_id: &str) -> ViewerResult<DocumentInfo> {
        self.license.check()?;
        let identity = self.source.identify(document_id).await?;
        let (_, name, model) = self.open_model(document_id).await?;

        let state = self
            .transforms
            .snapshot(&identity)
            .filter(|s| s.page_count() == model.page_count())
            .unwrap_or_else(|| PageTransformState::identity(model.page_count()));

        let pages = state
            .order()
            .iter()
            .enumerate()
            .filter_map(|(i, &number)| {
                let page = model.page(number)?;
                Some(PageInfo {
                    number,
                    position: i as u32 + 1,
                    width: page.width,
                    height: page.height,
                    rotation: state.rotation(number),
                })
            })
            .collect();

        let attachments = model
            .attachments()
            .iter()
            .map(|a| AttachmentInfo {
                name: a.name.clone(),
                file_type: a.file_type().map(str::to_string),
                mime_type: a.mime_type.clone(),
                size: a.data.len(),
            })
            .collect();

        Ok(DocumentInfo {
            id: identity.id().to_string(),
            name,
            format: model.format(),
            page_count: model.page_count(),
            pages,
            attachments,
        })
    }

    /// Rotate original page `page` to `angle` degrees for later renders.
    pub async fn rotate_page(&self, document_id: &str, page: u32, angle: i32) -> ViewerResult<()> {
        self.license.check()?;
        let identity = self.source.identify(document_id).await?;
        let (_, _, model) = self.open_model(document_id).await?;
        self.transforms
            .rotate(&identity, model.page_count(), page, angle)
    }

    /// Move the page at position `current` to position `new` for later renders.
    pub async fn reorder_page(&self, document_id: &str, current: u32, new: u32) -> ViewerResult<()> {
        self.license.check()?;
        let identity = self.source.identify(document_id).await?;
        let (_, _, model) = self.open_model(document_id).await?;
        self.transforms
            .reorder(&identity, model.page_count(), current, new)
    }

    /// Evict cached renders, transform state and resources of one document
    /// (every version and attachment), or of all documents.
    ///
    /// The identifier is resolved through the source, so any spelling the
    /// source accepts clears the same document. Identifiers the source no
    /// longer knows are cleared as given.
    ///
    /// Renders in flight are not interrupted and complete into the cache.
    pub async fn clear_cache(&self, document_id: Option<&str>) -> ViewerResult<usize> {
        self.license.check()?;
        let Some(id) = document_id else {
            let removed = self.cache.clear(None).await?;
            self.transforms.clear();
            self.resources.clear();
            return Ok(removed);
        };

        let owner = match self.source.identify(id).await {
            Ok(identity) => identity.owner().to_string(),
            Err(StorageError::NotFound(_)) => id.to_string(),
            Err(e) => return Err(e.into()),
        };
        let removed = self.cache.clear(Some(&owner)).await?;
        self.transforms.remove_document(&owner);
        self.resources.remove_document(&owner);
        Ok(removed)
    }
}
