//! Partial and conditional downloads

use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, StatusCode, header};

use crate::support::{TEST_HOST, TestApp, TestResponse, send_request};

async fn get_with(app: &TestApp, path: &str, name: header::HeaderName, value: &str) -> TestResponse {
    let request = Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(header::HOST, TEST_HOST)
        .header(name, value)
        .body(Body::empty())
        .unwrap();
    send_request(app.app.clone(), request).await
}

#[tokio::test]
async fn test_byte_range_returns_partial_content() {
    let app = TestApp::new();
    let path = app.upload("/digits.txt", "0123456789").await;

    let response = get_with(&app, &path, header::RANGE, "bytes=2-4").await;

    assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(&response.body[..], b"234");
    assert_eq!(response.headers[header::CONTENT_RANGE], "bytes 2-4/10");
}

#[tokio::test]
async fn test_suffix_range_returns_tail() {
    let app = TestApp::new();
    let path = app.upload("/digits.txt", "0123456789").await;

    let response = get_with(&app, &path, header::RANGE, "bytes=-3").await;

    assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(&response.body[..], b"789");
}

#[tokio::test]
async fn test_unsatisfiable_range_is_416() {
    let app = TestApp::new();
    let path = app.upload("/digits.txt", "0123456789").await;

    let response = get_with(&app, &path, header::RANGE, "bytes=50-60").await;

    assert_eq!(response.status, StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn test_full_download_advertises_last_modified() {
    let app = TestApp::new();
    let path = app.upload("/digits.txt", "0123456789").await;

    let response = app.get(&path).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.headers.contains_key(header::LAST_MODIFIED));
    assert_eq!(response.headers[header::ACCEPT_RANGES], "bytes");
}

#[tokio::test]
async fn test_unchanged_file_is_304() {
    let app = TestApp::new();
    let path = app.upload("/digits.txt", "0123456789").await;
    let last_modified: HeaderValue = app.get(&path).await.headers[header::LAST_MODIFIED].clone();

    let response = get_with(
        &app,
        &path,
        header::IF_MODIFIED_SINCE,
        last_modified.to_str().unwrap(),
    )
    .await;

    assert_eq!(response.status, StatusCode::NOT_MODIFIED);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_stale_validator_gets_full_body() {
    let app = TestApp::new();
    let path = app.upload("/digits.txt", "0123456789").await;

    let response = get_with(
        &app,
        &path,
        header::IF_MODIFIED_SINCE,
        "Thu, 01 Jan 1970 00:00:00 GMT",
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], b"0123456789");
}

#[tokio::test]
async fn test_range_on_missing_pair_is_404() {
    let app = TestApp::new();

    let response = get_with(&app, "/abc123/missing.txt", header::RANGE, "bytes=0-1").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.text(), "File not found");
}
