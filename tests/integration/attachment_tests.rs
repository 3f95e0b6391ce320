//! Attachment and export integration tests.
//!
//! Tests verify:
//! - Attachments are listed in document info and render like documents
//! - Attachment renders are cached and cleared with their parent
//! - Rendered pages export to a directory with their resources

use docview::{export_pages, RenderOptions, RenderTarget, ViewerConfig, ViewerError};

use super::test_utils::sample_viewer;

#[tokio::test]
async fn test_info_lists_attachments() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());

    let info = viewer.get_document_info("mail.eml").await.unwrap();

    assert_eq!(info.attachments.len(), 1);
    let attachment = &info.attachments[0];
    assert_eq!(attachment.name, "notes.txt");
    assert_eq!(attachment.file_type.as_deref(), Some("txt"));
    assert!(attachment.size > 0);
}

#[tokio::test]
async fn test_render_attachment_pages() {
    let (viewer, counter) = sample_viewer(&ViewerConfig::default());
    let options = RenderOptions::default();

    let set = viewer
        .get_attachment_pages("mail.eml", "notes.txt", &options, &RenderTarget::Html)
        .await
        .unwrap();

    assert!(!set.cache_hit);
    assert_eq!(set.pages.iter().map(|p| p.number).collect::<Vec<_>>(), vec![1, 2]);
    assert!(set.pages[0].html().unwrap().contains("alpha"));
    assert!(set.pages[1].html().unwrap().contains("beta"));
    assert_eq!(super::test_utils::loads(&counter), 1);

    let again = viewer
        .get_attachment_pages("mail.eml", "notes.txt", &options, &RenderTarget::Html)
        .await
        .unwrap();
    assert!(again.cache_hit);
    assert_eq!(super::test_utils::loads(&counter), 1);

    // Resources resolve through the combined identifier
    viewer
        .get_resource("mail.eml!notes.txt", "page_1.css")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_missing_attachment() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());

    let err = viewer
        .get_attachment_pages("mail.eml", "other.pdf", &RenderOptions::default(), &RenderTarget::Html)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ViewerError::AttachmentNotFound { ref attachment, .. } if attachment == "other.pdf"
    ));
}

#[tokio::test]
async fn test_clearing_parent_clears_attachment() {
    let (viewer, counter) = sample_viewer(&ViewerConfig::default());
    let options = RenderOptions::default();

    viewer
        .get_attachment_pages("mail.eml", "notes.txt", &options, &RenderTarget::Html)
        .await
        .unwrap();
    viewer.clear_cache(Some("mail.eml")).await.unwrap();

    let err = viewer
        .get_resource("mail.eml!notes.txt", "page_1.css")
        .await
        .unwrap_err();
    assert!(matches!(err, ViewerError::ResourceNotFound { .. }));

    let set = viewer
        .get_attachment_pages("mail.eml", "notes.txt", &options, &RenderTarget::Html)
        .await
        .unwrap();
    assert!(!set.cache_hit);
    assert_eq!(super::test_utils::loads(&counter), 2);
}

#[tokio::test]
async fn test_export_rendered_pages() {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");

    viewer.reorder_page("report.docx", 3, 1).await.unwrap();
    let pages = viewer.get_pages("report.docx", None).await.unwrap();
    let files = export_pages(&out, &pages).await.unwrap();

    for n in 1..=3 {
        let html = std::fs::read_to_string(out.join(format!("page_{}.html", n))).unwrap();
        assert!(html.contains(&format!("report.docx page {}", n)));
        assert!(out.join("resources").join(format!("page_{}.css", n)).exists());
    }
    assert!(files.iter().all(|f| f.exists()));
}
