//! HTTP API integration tests.
//!
//! Tests verify:
//! - Page listing and page content over HTTP for a custom-format document
//! - Response headers (content type, cache hit)
//! - Transforms and cache eviction endpoints
//! - Error responses (missing document, bad options, license failure)

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use docview::{create_router, RouterConfig, ViewerConfig, ViewerService};

use super::test_utils::{expired_license, sample_source, sample_viewer};

fn router() -> Router {
    let (viewer, _) = sample_viewer(&ViewerConfig::default());
    create_router(viewer, RouterConfig::new().with_tracing(false))
}

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    json: Option<&str>,
) -> (StatusCode, axum::http::HeaderMap, bytes::Bytes) {
    let mut request = Request::builder().method(method).uri(uri);
    if json.is_some() {
        request = request.header("content-type", "application/json");
    }
    let body = match json {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    };
    let response = router.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes)
}

fn json(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes).unwrap()
}

// =============================================================================
// Pages
// =============================================================================

#[tokio::test]
async fn test_list_pages_of_custom_format() {
    let router = router();

    let (status, _, body) = call(&router, Method::GET, "/documents/report.docx/pages", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["document"], "report.docx");
    let pages = body["pages"].as_array().unwrap();
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[2]["number"], 3);
    assert_eq!(pages[2]["file_name"], "page_3.html");
    assert_eq!(pages[2]["resources"][0], "page_3.css");
}

#[tokio::test]
async fn test_page_content_and_cache_header() {
    let router = router();

    let (status, headers, body) =
        call(&router, Method::GET, "/documents/report.docx/pages/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "text/html; charset=utf-8");
    assert_eq!(headers["x-cache-hit"], "false");
    assert!(String::from_utf8_lossy(&body).contains("report.docx page 2"));

    let (_, headers, _) = call(&router, Method::GET, "/documents/report.docx/pages/2", None).await;
    assert_eq!(headers["x-cache-hit"], "true");
}

#[tokio::test]
async fn test_page_as_png() {
    let router = router();

    let (status, headers, body) = call(
        &router,
        Method::GET,
        "/documents/notes.txt/pages/1?format=png&width=200",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "image/png");
    let img = image::load_from_memory(&body).unwrap();
    assert_eq!(img.width(), 200);
}

#[tokio::test]
async fn test_resource_endpoint() {
    let router = router();
    call(&router, Method::GET, "/documents/report.docx/pages", None).await;

    let (status, headers, _) = call(
        &router,
        Method::GET,
        "/documents/report.docx/resources/page_1.css",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "text/css");

    let (status, _, body) = call(
        &router,
        Method::GET,
        "/documents/report.docx/resources/missing.png",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["error"], "resource_not_found");
}

#[tokio::test]
async fn test_document_info_endpoint() {
    let router = router();

    let (status, _, body) = call(&router, Method::GET, "/documents/mail.eml/info", None).await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["format"], "email");
    assert_eq!(body["attachments"][0]["name"], "notes.txt");
}

#[tokio::test]
async fn test_attachment_pages_endpoint() {
    let router = router();

    let (status, _, body) = call(
        &router,
        Method::GET,
        "/documents/mail.eml/pages?attachment=notes.txt",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["pages"].as_array().unwrap().len(), 2);
}

// =============================================================================
// Transforms and Cache
// =============================================================================

#[tokio::test]
async fn test_reorder_endpoint() {
    let router = router();

    let (status, _, _) = call(
        &router,
        Method::POST,
        "/documents/report.docx/reorder",
        Some(r#"{"current": 3, "new": 1}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, _, body) = call(&router, Method::GET, "/documents/report.docx/pages", None).await;
    let numbers: Vec<u64> = json(&body)["pages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["number"].as_u64().unwrap())
        .collect();
    assert_eq!(numbers, vec![3, 1, 2]);
}

#[tokio::test]
async fn test_clear_cache_endpoints() {
    let router = router();
    call(&router, Method::GET, "/documents/report.docx/pages", None).await;
    call(&router, Method::GET, "/documents/notes.txt/pages", None).await;

    let (status, _, body) =
        call(&router, Method::DELETE, "/documents/report.docx/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["removed"], 1);

    let (status, _, body) = call(&router, Method::DELETE, "/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["removed"], 1);
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_error_bodies() {
    let router = router();

    let (status, _, body) = call(&router, Method::GET, "/documents/absent.txt/pages", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body = json(&body);
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["status"], 404);

    let (status, _, body) = call(
        &router,
        Method::GET,
        "/documents/notes.txt/pages?watermark=X&watermark_width=150",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "invalid_options");

    let (status, _, body) = call(
        &router,
        Method::POST,
        "/documents/notes.txt/rotate",
        Some(r#"{"page": 1, "angle": 30}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "invalid_rotation");
}

#[tokio::test]
async fn test_license_failure_is_forbidden() {
    let viewer = ViewerService::new(sample_source(), expired_license());
    let router = create_router(viewer, RouterConfig::new().with_tracing(false));

    let (status, _, body) = call(&router, Method::GET, "/documents/notes.txt/pages", None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json(&body)["error"], "license_error");
}

#[tokio::test]
async fn test_health_endpoint() {
    let router = router();

    let (status, _, body) = call(&router, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "healthy");
}
