//! Upload/download round trips through the full router

use axum::body::Body;
use axum::http::{Method, StatusCode, header};
use dropbin_core::identifier::ALPHABET;

use crate::support::{TEST_HOST, TestApp, split_download_path};

#[tokio::test]
async fn test_hello_world_round_trip() {
    let app = TestApp::new();

    let response = app
        .send(Method::PUT, "/ignored/name.txt", Body::from("hello world"))
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let text = response.text();
    assert!(text.starts_with("File uploaded successfully. Download at:\n"));
    assert!(text.ends_with('\n'));

    let url = text.lines().nth(1).unwrap();
    let prefix = format!("http://{TEST_HOST}/");
    assert!(url.starts_with(&prefix), "unexpected url {url}");

    let (identifier, filename) = split_download_path(&url[prefix.len() - 1..]);
    assert_eq!(identifier.len(), 6);
    assert!(identifier.bytes().all(|b| ALPHABET.contains(&b)));
    assert_eq!(filename, "name.txt");

    let download = app.get(&format!("/{identifier}/{filename}")).await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(&download.body[..], b"hello world");
}

#[tokio::test]
async fn test_missing_pair_is_404() {
    let app = TestApp::new();

    let response = app.get("/abc123/missing.txt").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.text(), "File not found");
}

#[tokio::test]
async fn test_known_identifier_wrong_filename_is_404() {
    let app = TestApp::new();
    let path = app.upload("/real.txt", "content").await;
    let (identifier, _) = split_download_path(&path);

    let response = app.get(&format!("/{identifier}/other.txt")).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_body_creates_readable_empty_file() {
    let app = TestApp::new();

    let path = app.upload("/empty.dat", Body::empty()).await;
    let response = app.get(&path).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_empty());
    assert_eq!(response.headers[header::CONTENT_LENGTH], "0");
}

#[tokio::test]
async fn test_binary_content_is_byte_identical() {
    let app = TestApp::new();
    let content: Vec<u8> = (0..=255u8).cycle().take(300_000).collect();

    let path = app.upload("/blob.bin", content.clone()).await;
    let response = app.get(&path).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.len(), content.len());
    assert_eq!(&response.body[..], &content[..]);
}

#[tokio::test]
async fn test_content_type_inferred_from_extension() {
    let app = TestApp::new();

    let html = app.upload("/page.html", "<p>hi</p>").await;
    let unknown = app.upload("/data.unknownext", "???").await;

    let response = app.get(&html).await;
    assert!(
        response.headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );

    let response = app.get(&unknown).await;
    assert_eq!(
        response.headers[header::CONTENT_TYPE],
        "application/octet-stream"
    );
}

#[tokio::test]
async fn test_filename_with_spaces_round_trips() {
    let app = TestApp::new();

    let path = app.upload("/my%20notes.md", "# notes").await;
    assert!(path.ends_with("/my%20notes.md"));

    let response = app.get(&path).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], b"# notes");
}

#[tokio::test]
async fn test_root_upload_gets_placeholder_name() {
    let app = TestApp::new();

    let path = app.upload("/", "anonymous").await;

    assert!(path.ends_with("/uploaded-file"));
    assert_eq!(&app.get(&path).await.body[..], b"anonymous");
}

#[tokio::test]
async fn test_each_upload_gets_its_own_identifier() {
    let app = TestApp::new();

    let first = app.upload("/same.txt", "one").await;
    let second = app.upload("/same.txt", "two").await;

    assert_ne!(first, second);
    assert_eq!(&app.get(&first).await.body[..], b"one");
    assert_eq!(&app.get(&second).await.body[..], b"two");
}

#[tokio::test]
async fn test_concurrent_uploads_do_not_interfere() {
    let app = TestApp::new();

    let uploads = (0..16).map(|i| {
        let app = &app;
        async move {
            let content = format!("payload number {i}").repeat(100);
            let path = app.upload(&format!("/file-{i}.txt"), content.clone()).await;
            (path, content)
        }
    });
    let results = futures::future::join_all(uploads).await;

    for (path, content) in results {
        let response = app.get(&path).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), content);
    }
}

#[tokio::test]
async fn test_upload_lands_under_configured_root() {
    let app = TestApp::new();

    let path = app.upload("/stored.txt", "on disk").await;
    let (identifier, filename) = split_download_path(&path);

    let on_disk = std::fs::read(app.root().join(identifier).join(filename)).unwrap();
    assert_eq!(on_disk, b"on disk");
}

#[tokio::test]
async fn test_favicon_served_inline() {
    let app = TestApp::new();

    let response = app.get("/favicon.ico").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers[header::CONTENT_TYPE], "image/svg+xml");
    assert!(response.text().starts_with("<svg"));
}

#[tokio::test]
async fn test_cors_headers_present() {
    let app = TestApp::new();
    let request = axum::http::Request::builder()
        .method(Method::GET)
        .uri("/abc123/missing.txt")
        .header(header::ORIGIN, "https://elsewhere.example")
        .body(Body::empty())
        .unwrap();

    let response = crate::support::send_request(app.app.clone(), request).await;

    assert_eq!(response.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
