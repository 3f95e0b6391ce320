//! Cache effectiveness integration tests.
//!
//! Tests verify:
//! - A repeated render is served from the cache without adapter work
//! - Concurrent identical requests share one render
//! - Changed content, options or targets render again
//! - Disk caches survive a new service instance
//! - Disabled caching writes nothing

use std::sync::Arc;
use std::time::Duration;

use docview::{
    CancellationToken, DocumentFormat, LocalDocumentSource, MemoryDocumentSource, RenderOptions,
    RenderTarget, ViewerConfig, ViewerService, Watermark,
};

use super::test_utils::{
    licensed, loads, registry_with, sample_viewer, text_document, CountingAdapter,
};

fn counted_text_viewer(
    source: MemoryDocumentSource,
    config: &ViewerConfig,
    delay: Duration,
) -> (ViewerService<MemoryDocumentSource>, Arc<std::sync::atomic::AtomicUsize>) {
    let adapter =
        CountingAdapter::new(Arc::new(docview::format::TextAdapter::new())).with_delay(delay);
    let (registry, counter) = registry_with(DocumentFormat::PlainText, adapter);
    let viewer = ViewerService::with_config(source, licensed(), config).with_adapters(registry);
    (viewer, counter)
}

// =============================================================================
// Reuse
// =============================================================================

#[tokio::test]
async fn test_second_render_is_cache_hit() {
    let (viewer, counter) = sample_viewer(&ViewerConfig::default());
    let options = RenderOptions::default();
    let cancel = CancellationToken::new();

    let first = viewer
        .render_pages("notes.txt", &options, &RenderTarget::Html, &cancel)
        .await
        .unwrap();
    assert!(!first.cache_hit);
    assert_eq!(loads(&counter), 1);

    let second = viewer
        .render_pages("notes.txt", &options, &RenderTarget::Html, &cancel)
        .await
        .unwrap();
    assert!(second.cache_hit);
    assert_eq!(loads(&counter), 1);

    assert_eq!(first.pages.len(), second.pages.len());
    for (a, b) in first.pages.iter().zip(&second.pages) {
        assert_eq!(a.content(), b.content());
    }
}

#[tokio::test]
async fn test_options_and_targets_are_cached_independently() {
    let (viewer, counter) = sample_viewer(&ViewerConfig::default());

    viewer.get_pages("notes.txt", None).await.unwrap();
    let watermarked = RenderOptions::new().with_watermark(Watermark::new("DRAFT"));
    viewer.get_pages("notes.txt", Some(&watermarked)).await.unwrap();
    viewer
        .render_pages(
            "notes.txt",
            &RenderOptions::default(),
            &RenderTarget::png(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(loads(&counter), 3);

    // All three are now cached
    viewer.get_pages("notes.txt", None).await.unwrap();
    viewer.get_pages("notes.txt", Some(&watermarked)).await.unwrap();
    assert_eq!(loads(&counter), 3);
}

#[tokio::test]
async fn test_modified_document_renders_again() {
    let source = MemoryDocumentSource::new().with_document("doc.txt", text_document(2));
    let (viewer, counter) = counted_text_viewer(source, &ViewerConfig::default(), Duration::ZERO);

    assert_eq!(viewer.get_pages("doc.txt", None).await.unwrap().len(), 2);

    viewer.source().insert("doc.txt", text_document(4));
    let pages = viewer.get_pages("doc.txt", None).await.unwrap();

    assert_eq!(pages.len(), 4);
    assert_eq!(loads(&counter), 2);
}

#[tokio::test]
async fn test_clear_cache_forces_render() {
    let (viewer, counter) = sample_viewer(&ViewerConfig::default());

    viewer.get_pages("notes.txt", None).await.unwrap();
    viewer.get_pages("report.docx", None).await.unwrap();
    let removed = viewer.clear_cache(Some("notes.txt")).await.unwrap();
    assert_eq!(removed, 1);

    viewer.get_pages("notes.txt", None).await.unwrap();
    assert_eq!(loads(&counter), 2);

    let removed = viewer.clear_cache(None).await.unwrap();
    assert_eq!(removed, 2);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_one_render() {
    let source = MemoryDocumentSource::new().with_document("doc.txt", text_document(3));
    let (viewer, counter) =
        counted_text_viewer(source, &ViewerConfig::default(), Duration::from_millis(100));
    let viewer = Arc::new(viewer);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let viewer = Arc::clone(&viewer);
            tokio::spawn(async move { viewer.get_pages("doc.txt", None).await })
        })
        .collect();

    for handle in handles {
        let pages = handle.await.unwrap().unwrap();
        assert_eq!(pages.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
    assert_eq!(loads(&counter), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_for_different_documents() {
    let source = MemoryDocumentSource::new()
        .with_document("a.txt", text_document(1))
        .with_document("b.txt", text_document(2));
    let (viewer, counter) =
        counted_text_viewer(source, &ViewerConfig::default(), Duration::from_millis(20));
    let viewer = Arc::new(viewer);

    let a = {
        let viewer = Arc::clone(&viewer);
        tokio::spawn(async move { viewer.get_pages("a.txt", None).await })
    };
    let b = {
        let viewer = Arc::clone(&viewer);
        tokio::spawn(async move { viewer.get_pages("b.txt", None).await })
    };

    assert_eq!(a.await.unwrap().unwrap().len(), 1);
    assert_eq!(b.await.unwrap().unwrap().len(), 2);
    assert_eq!(loads(&counter), 2);
}

// =============================================================================
// Disk Cache
// =============================================================================

#[tokio::test]
async fn test_disk_cache_survives_new_service() {
    let dir = tempfile::tempdir().unwrap();
    let config = ViewerConfig::disk(dir.path().join("cache"));

    let (viewer, counter) = sample_viewer(&config);
    let first = viewer.get_pages("notes.txt", None).await.unwrap();
    assert_eq!(loads(&counter), 1);
    assert!(dir.path().join("cache").exists());
    drop(viewer);

    let (viewer, counter) = sample_viewer(&config);
    let set = viewer
        .render_pages(
            "notes.txt",
            &RenderOptions::default(),
            &RenderTarget::Html,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(set.cache_hit);
    assert_eq!(loads(&counter), 0);
    assert_eq!(set.pages.len(), first.len());
    for (a, b) in first.iter().zip(&set.pages) {
        assert_eq!(a.number, b.number);
        assert_eq!(a.content(), b.content());
        assert_eq!(a.resources, b.resources);
    }

    // Resources of a disk hit resolve as well
    viewer.get_resource("notes.txt", "page_1.css").await.unwrap();
}

#[tokio::test]
async fn test_disabled_cache_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = dir.path().join("cache");
    let config = ViewerConfig {
        use_cache: false,
        ..ViewerConfig::disk(&cache_dir)
    };
    let (viewer, counter) = sample_viewer(&config);

    viewer.get_pages("notes.txt", None).await.unwrap();
    let set = viewer
        .render_pages(
            "notes.txt",
            &RenderOptions::default(),
            &RenderTarget::Html,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(!set.cache_hit);
    assert_eq!(loads(&counter), 2);
    assert!(!cache_dir.exists());
    assert_eq!(viewer.clear_cache(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_clear_with_alternate_spelling() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs/a.txt"), "one\u{c}two").unwrap();
    let viewer = ViewerService::new(LocalDocumentSource::new(dir.path()), licensed());

    viewer.get_pages("./docs/a.txt", None).await.unwrap();
    viewer.rotate_page("./docs/a.txt", 1, 90).await.unwrap();

    let removed = viewer.clear_cache(Some("./docs/a.txt")).await.unwrap();
    assert_eq!(removed, 1);

    // Transform state went with the cached renders
    let pages = viewer.get_pages("docs/a.txt", None).await.unwrap();
    assert_eq!(pages[0].rotation, 0);
    viewer.get_resource("docs/a.txt", "page_1.css").await.unwrap();
}

#[tokio::test]
async fn test_clear_deleted_document() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("gone.txt"), "one").unwrap();
    let viewer = ViewerService::new(LocalDocumentSource::new(dir.path()), licensed());

    viewer.get_pages("gone.txt", None).await.unwrap();
    std::fs::remove_file(dir.path().join("gone.txt")).unwrap();

    assert_eq!(viewer.clear_cache(Some("gone.txt")).await.unwrap(), 1);
}
