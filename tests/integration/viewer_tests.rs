//! ViewerService rendering tests.
//!
//! Tests verify:
//! - Pages come back in order with original page numbers
//! - Page selection (explicit numbers, start position, count)
//! - Image targets and resources
//! - Error cases (missing document, unsupported format, bad page numbers)

use docview::{
    CancellationToken, ImageEncoding, MemoryDocumentSource, PageBody, RenderOptions, RenderTarget,
    ViewerConfig, ViewerError, ViewerService, Watermark,
};

use super::test_utils::{licensed, png_bytes, sample_viewer, text_document};

fn numbers(pages: &[std::sync::Arc<docview::RenderedPage>]) -> Vec<u32> {
    pages.iter().map(|p| p.number).collect()
}

// =============================================================================
// Page Order and Selection
// =============================================================================

#[tokio::test]
async fn test_custom_adapter_renders_all_pages_in_order() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());

    let pages = viewer.get_pages("report.docx", None).await.unwrap();

    assert_eq!(numbers(&pages), vec![1, 2, 3]);
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.position, i as u32 + 1);
        assert_eq!(page.rotation, 0);
        let html = page.html().unwrap();
        assert!(html.contains(&format!("report.docx page {}", i + 1)));
    }
}

#[tokio::test]
async fn test_explicit_page_selection() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());
    let options = RenderOptions::new().with_pages([3, 1]);

    let pages = viewer.get_pages("notes.txt", Some(&options)).await.unwrap();

    assert_eq!(numbers(&pages), vec![1, 3]);
}

#[tokio::test]
async fn test_start_and_count() {
    let source = MemoryDocumentSource::new().with_document("long.txt", text_document(6));
    let viewer = ViewerService::new(source, licensed());
    let options = RenderOptions::new().starting_at(2).with_count(3);

    let pages = viewer.get_pages("long.txt", Some(&options)).await.unwrap();

    assert_eq!(numbers(&pages), vec![2, 3, 4]);
}

#[tokio::test]
async fn test_invalid_page_number() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());
    let options = RenderOptions::new().with_pages([7]);

    let err = viewer.get_pages("notes.txt", Some(&options)).await.unwrap_err();

    assert!(matches!(
        err,
        ViewerError::InvalidPageNumber {
            page: 7,
            page_count: 3
        }
    ));
}

#[tokio::test]
async fn test_invalid_options_rejected() {
    let (viewer, counter) = sample_viewer(&ViewerConfig::default());
    let options = RenderOptions::new().with_count(0);

    let err = viewer.get_pages("notes.txt", Some(&options)).await.unwrap_err();

    assert!(matches!(err, ViewerError::InvalidOptions(_)));
    assert_eq!(super::test_utils::loads(&counter), 0);
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_missing_document() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());

    let err = viewer.get_pages("missing.txt", None).await.unwrap_err();

    assert!(matches!(err, ViewerError::DocumentNotFound(ref id) if id == "missing.txt"));
}

#[tokio::test]
async fn test_format_without_adapter_is_unsupported() {
    let source = MemoryDocumentSource::new().with_document("slides.pptx", super::test_utils::zip_bytes());
    let viewer = ViewerService::new(source, licensed());

    let err = viewer.get_pages("slides.pptx", None).await.unwrap_err();

    assert!(matches!(err, ViewerError::UnsupportedFormat { .. }));
}

#[tokio::test]
async fn test_corrupt_document() {
    let source = MemoryDocumentSource::new().with_document("photo.png", "not a png");
    let viewer = ViewerService::new(source, licensed());

    let err = viewer.get_pages("photo.png", None).await.unwrap_err();

    assert!(matches!(err, ViewerError::CorruptDocument { .. }));
}

// =============================================================================
// Targets and Resources
// =============================================================================

#[tokio::test]
async fn test_png_target_with_width() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());
    let target = RenderTarget::png().with_size(Some(120), None);

    let set = viewer
        .render_pages("notes.txt", &RenderOptions::default(), &target, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(set.pages.len(), 3);
    for page in &set.pages {
        assert!(matches!(
            page.body,
            PageBody::Image {
                encoding: ImageEncoding::Png,
                ..
            }
        ));
        assert_eq!(page.file_name(), format!("page_{}.png", page.number));
        let img = image::load_from_memory(&page.content()).unwrap();
        assert_eq!(img.width(), 120);
    }
}

#[tokio::test]
async fn test_raster_document_as_jpeg() {
    let source = MemoryDocumentSource::new().with_document("scan.png", png_bytes(64, 48));
    let viewer = ViewerService::new(source, licensed());

    let set = viewer
        .render_pages(
            "scan.png",
            &RenderOptions::default(),
            &RenderTarget::jpeg(70),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(set.pages.len(), 1);
    let data = set.pages[0].content();
    assert_eq!(&data[..2], &[0xFF, 0xD8]);
    let img = image::load_from_memory(&data).unwrap();
    assert_eq!((img.width(), img.height()), (64, 48));
}

#[tokio::test]
async fn test_resources_resolve_by_name() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());

    let pages = viewer.get_pages("report.docx", None).await.unwrap();
    assert_eq!(pages.len(), 3);

    for page in &pages {
        for resource in &page.resources {
            let found = viewer.get_resource("report.docx", &resource.name).await.unwrap();
            assert_eq!(found.data, resource.data);
        }
    }
    let css = viewer.get_resource("report.docx", "page_2.css").await.unwrap();
    assert_eq!(css.mime_type, "text/css");

    let err = viewer.get_resource("report.docx", "nope.png").await.unwrap_err();
    assert!(matches!(err, ViewerError::ResourceNotFound { .. }));
}

#[tokio::test]
async fn test_embedded_resources_are_inlined() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());
    let options = RenderOptions::new().embed_resources(true);

    let pages = viewer.get_pages("report.docx", Some(&options)).await.unwrap();

    for page in &pages {
        assert!(page.resources.is_empty());
        assert!(page.html().unwrap().contains("<style>"));
    }
    let err = viewer.get_resource("report.docx", "page_1.css").await.unwrap_err();
    assert!(matches!(err, ViewerError::ResourceNotFound { .. }));
}

#[tokio::test]
async fn test_watermark_on_every_page() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());
    let options = RenderOptions::new().with_watermark(Watermark::new("CONFIDENTIAL"));

    let pages = viewer.get_pages("notes.txt", Some(&options)).await.unwrap();

    assert_eq!(pages.len(), 3);
    assert!(pages
        .iter()
        .all(|p| p.html().unwrap().contains("CONFIDENTIAL")));
}

#[tokio::test]
async fn test_image_watermark_draws_its_text() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());

    async fn first_png(viewer: &ViewerService<MemoryDocumentSource>, text: &str) -> bytes::Bytes {
        let options = RenderOptions::new()
            .with_pages([1])
            .with_watermark(Watermark::new(text));
        let set = viewer
            .render_pages("notes.txt", &options, &RenderTarget::png(), &CancellationToken::new())
            .await
            .unwrap();
        set.pages[0].content()
    }

    let draft = first_png(&viewer, "DRAFT").await;
    let hold = first_png(&viewer, "TOP SECRET LEGAL HOLD").await;

    assert_ne!(draft, hold);
}

#[tokio::test]
async fn test_document_info() {
    let (viewer, counter) = sample_viewer(&ViewerConfig::default());

    let info = viewer.get_document_info("notes.txt").await.unwrap();

    assert_eq!(info.id, "notes.txt");
    assert_eq!(info.page_count, 3);
    assert_eq!(info.pages.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(info.attachments.is_empty());
    assert_eq!(super::test_utils::loads(&counter), 1);
    // Metadata reads do not populate the render cache
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
}
