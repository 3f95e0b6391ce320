//! License gate integration tests.
//!
//! Tests verify:
//! - Every operation fails with a license error before touching adapters
//! - Valid keys unlock the service

use std::sync::Arc;

use docview::{
    issue_license, LicenseError, RenderOptions, RenderTarget, SignedLicense, ViewerConfig,
    ViewerError, ViewerService,
};

use super::test_utils::{
    expired_license, loads, registry_with, sample_source, CountingAdapter, SECRET,
};

fn counted_viewer(
    license: Arc<SignedLicense>,
) -> (
    ViewerService<docview::MemoryDocumentSource>,
    Arc<std::sync::atomic::AtomicUsize>,
) {
    let adapter = CountingAdapter::new(Arc::new(docview::format::TextAdapter::new()));
    let (registry, counter) = registry_with(docview::DocumentFormat::PlainText, adapter);
    let viewer = ViewerService::with_config(sample_source(), license, &ViewerConfig::default())
        .with_adapters(registry);
    (viewer, counter)
}

#[tokio::test]
async fn test_expired_license_blocks_before_adapter() {
    let (viewer, counter) = counted_viewer(expired_license());

    let err = viewer.get_pages("notes.txt", None).await.unwrap_err();
    assert!(matches!(
        err,
        ViewerError::License(LicenseError::Expired { expired_at: 1, .. })
    ));

    assert!(matches!(
        viewer.rotate_page("notes.txt", 1, 90).await,
        Err(ViewerError::License(_))
    ));
    assert!(matches!(
        viewer.get_document_info("notes.txt").await,
        Err(ViewerError::License(_))
    ));
    assert!(matches!(
        viewer
            .get_attachment_pages("mail.eml", "notes.txt", &RenderOptions::default(), &RenderTarget::Html)
            .await,
        Err(ViewerError::License(_))
    ));
    assert_eq!(loads(&counter), 0);
}

#[tokio::test]
async fn test_missing_license_key() {
    let (viewer, counter) = counted_viewer(Arc::new(SignedLicense::new(SECRET, None)));

    let err = viewer.get_pages("notes.txt", None).await.unwrap_err();

    assert!(matches!(err, ViewerError::License(LicenseError::Missing)));
    assert_eq!(loads(&counter), 0);
}

#[tokio::test]
async fn test_key_signed_with_other_secret() {
    let key = issue_license("another-secret", "intruder", 4_102_444_800).unwrap();
    let (viewer, _) = counted_viewer(Arc::new(SignedLicense::new(SECRET, Some(key))));

    let err = viewer.get_pages("notes.txt", None).await.unwrap_err();

    assert!(matches!(err, ViewerError::License(LicenseError::InvalidSignature)));
}

#[tokio::test]
async fn test_valid_license_unlocks() {
    let key = issue_license(SECRET, "ACME Corp", 4_102_444_800).unwrap();
    let (viewer, counter) = counted_viewer(Arc::new(SignedLicense::new(SECRET, Some(key))));

    let pages = viewer.get_pages("notes.txt", None).await.unwrap();

    assert_eq!(pages.len(), 3);
    assert_eq!(loads(&counter), 1);
}
