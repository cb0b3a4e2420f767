//! Upload size limit enforcement

use std::io;

use axum::body::{Body, Bytes};
use axum::http::{Method, Request, StatusCode, header};

use crate::support::{TEST_HOST, TestApp, files_under, send_request};

const MEGABYTE: usize = 1024 * 1024;

fn chunked_body(chunks: usize, chunk_size: usize) -> Body {
    let stream = futures::stream::iter(
        (0..chunks).map(move |_| Ok::<_, io::Error>(Bytes::from(vec![b'x'; chunk_size]))),
    );
    Body::from_stream(stream)
}

#[tokio::test]
async fn test_declared_length_over_limit_is_413() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/big.bin")
        .header(header::HOST, TEST_HOST)
        .header(header::CONTENT_LENGTH, MEGABYTE + 1)
        .body(Body::from(vec![0u8; MEGABYTE + 1]))
        .unwrap();

    let response = send_request(app.app.clone(), request).await;

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(files_under(&app.root()).is_empty());
}

#[tokio::test]
async fn test_streamed_body_over_limit_is_413_and_cleaned_up() {
    let app = TestApp::new();

    let response = app
        .send(Method::PUT, "/stream.bin", chunked_body(32, 64 * 1024))
        .await;

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.text(), "Upload exceeds the maximum allowed size");
    assert!(files_under(&app.root()).is_empty());
}

#[tokio::test]
async fn test_body_exactly_at_limit_is_accepted() {
    let app = TestApp::new();

    let path = app.upload("/exact.bin", vec![7u8; MEGABYTE]).await;

    let response = app.get(&path).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.len(), MEGABYTE);
}

#[tokio::test]
async fn test_streamed_body_under_limit_is_accepted() {
    let app = TestApp::new();

    let path = app.upload("/chunks.bin", chunked_body(8, 16 * 1024)).await;

    let response = app.get(&path).await;
    assert_eq!(response.body.len(), 8 * 16 * 1024);
}

#[tokio::test]
async fn test_configured_limit_is_honoured() {
    let app = TestApp::with_config(|config| config.server.max_upload_mb = 2);

    let path = app.upload("/two.bin", chunked_body(24, 64 * 1024)).await;
    assert_eq!(app.get(&path).await.body.len(), 24 * 64 * 1024);

    let response = app
        .send(Method::PUT, "/three.bin", chunked_body(48, 64 * 1024))
        .await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
}
