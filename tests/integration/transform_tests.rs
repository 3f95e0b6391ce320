//! Rotate/reorder integration tests.
//!
//! Tests verify:
//! - Rotation shows up on the rotated page only
//! - Reordering changes positions but keeps original page numbers
//! - Transforms invalidate earlier cached renders
//! - Renders can opt out of registered transforms
//! - Invalid transforms are rejected without changing state

use docview::{
    CancellationToken, RenderOptions, RenderTarget, Transformations, ViewerConfig, ViewerError,
};

use super::test_utils::{loads, sample_viewer};

#[tokio::test]
async fn test_rotate_then_render() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());

    viewer.rotate_page("report.docx", 2, 90).await.unwrap();
    let pages = viewer.get_pages("report.docx", None).await.unwrap();

    assert_eq!(pages.iter().map(|p| p.rotation).collect::<Vec<_>>(), vec![0, 90, 0]);
    assert!(pages[1].html().unwrap().contains("rotate(90deg)"));
    assert!(!pages[0].html().unwrap().contains("rotate("));
}

#[tokio::test]
async fn test_rotation_is_last_write_wins() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());

    viewer.rotate_page("notes.txt", 1, 90).await.unwrap();
    viewer.rotate_page("notes.txt", 1, -90).await.unwrap();
    let pages = viewer.get_pages("notes.txt", None).await.unwrap();

    assert_eq!(pages[0].rotation, 270);
}

#[tokio::test]
async fn test_rotated_image_swaps_dimensions() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());
    let target = RenderTarget::png();
    let cancel = CancellationToken::new();

    let before = viewer
        .render_pages("notes.txt", &RenderOptions::default(), &target, &cancel)
        .await
        .unwrap();
    viewer.rotate_page("notes.txt", 1, 90).await.unwrap();
    let after = viewer
        .render_pages("notes.txt", &RenderOptions::default(), &target, &cancel)
        .await
        .unwrap();

    let a = image::load_from_memory(&before.pages[0].content()).unwrap();
    let b = image::load_from_memory(&after.pages[0].content()).unwrap();
    assert_eq!((a.width(), a.height()), (b.height(), b.width()));
}

#[tokio::test]
async fn test_reorder_keeps_original_numbers() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());

    viewer.reorder_page("report.docx", 3, 1).await.unwrap();
    let pages = viewer.get_pages("report.docx", None).await.unwrap();

    assert_eq!(pages.iter().map(|p| p.number).collect::<Vec<_>>(), vec![3, 1, 2]);
    assert_eq!(pages.iter().map(|p| p.position).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(pages[0].html().unwrap().contains("report.docx page 3"));
    assert_eq!(pages[0].file_name(), "page_3.html");
}

#[tokio::test]
async fn test_transform_invalidates_cached_render() {
    let (viewer, counter) = sample_viewer(&ViewerConfig::default());

    viewer.get_pages("notes.txt", None).await.unwrap();
    viewer.get_pages("notes.txt", None).await.unwrap();
    // One load for the render, the second call is a hit
    assert_eq!(loads(&counter), 1);

    // rotate_page reads the page count, then the render misses
    viewer.rotate_page("notes.txt", 3, 180).await.unwrap();
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
    assert_eq!(set.pages[2].rotation, 180);
    assert_eq!(loads(&counter), 3);
}

#[tokio::test]
async fn test_render_can_ignore_transforms() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());

    viewer.rotate_page("report.docx", 1, 90).await.unwrap();
    viewer.reorder_page("report.docx", 1, 3).await.unwrap();

    let plain = RenderOptions::new().with_transformations(Transformations::NONE);
    let pages = viewer.get_pages("report.docx", Some(&plain)).await.unwrap();
    assert_eq!(pages.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(pages.iter().all(|p| p.rotation == 0));

    let rotate_only = RenderOptions::new().with_transformations(Transformations {
        rotate: true,
        reorder: false,
    });
    let pages = viewer.get_pages("report.docx", Some(&rotate_only)).await.unwrap();
    assert_eq!(pages.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(pages[0].rotation, 90);

    let pages = viewer.get_pages("report.docx", None).await.unwrap();
    assert_eq!(pages.iter().map(|p| p.number).collect::<Vec<_>>(), vec![2, 3, 1]);
}

#[tokio::test]
async fn test_invalid_transforms_are_rejected() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());

    let err = viewer.rotate_page("report.docx", 1, 45).await.unwrap_err();
    assert!(matches!(err, ViewerError::InvalidRotation { angle: 45 }));

    let err = viewer.rotate_page("report.docx", 4, 90).await.unwrap_err();
    assert!(matches!(
        err,
        ViewerError::InvalidPageNumber {
            page: 4,
            page_count: 3
        }
    ));

    let err = viewer.reorder_page("report.docx", 0, 2).await.unwrap_err();
    assert!(matches!(err, ViewerError::InvalidPageNumber { page: 0, .. }));

    // Failed calls left no state behind
    let info = viewer.get_document_info("report.docx").await.unwrap();
    assert!(info.pages.iter().all(|p| p.rotation == 0));
    assert_eq!(info.pages.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_clear_cache_resets_transforms() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());

    viewer.reorder_page("report.docx", 2, 1).await.unwrap();
    viewer.clear_cache(Some("report.docx")).await.unwrap();

    let pages = viewer.get_pages("report.docx", None).await.unwrap();
    assert_eq!(pages.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1, 2, 3]);
}
