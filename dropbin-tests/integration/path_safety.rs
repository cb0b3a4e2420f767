//! Uploads and downloads can never escape the upload root

use axum::body::Body;
use axum::http::{Method, StatusCode};

use crate::support::{TestApp, files_under, split_download_path};

fn assert_confined(app: &TestApp) {
    let root = app.root();
    let sandbox = root.parent().unwrap();

    for file in files_under(sandbox) {
        let relative = file
            .strip_prefix(&root)
            .unwrap_or_else(|_| panic!("{} escaped the upload root", file.display()));
        assert_eq!(
            relative.components().count(),
            2,
            "{} is not identifier/filename",
            relative.display()
        );
    }
}

#[tokio::test]
async fn test_traversal_upload_stays_inside_identifier_directory() {
    let app = TestApp::new();

    let path = app.upload("/../../etc/passwd", "not really").await;

    let (_, filename) = split_download_path(&path);
    assert_eq!(filename, "passwd");
    assert_confined(&app);
}

#[tokio::test]
async fn test_encoded_traversal_upload_is_reduced_to_basename() {
    let app = TestApp::new();

    let slashes = app.upload("/..%2F..%2Fescape.txt", "one").await;
    let backslashes = app.upload("/..%5C..%5Cwin.ini", "two").await;
    let dots_only = app.upload("/%2E%2E", "three").await;

    assert!(slashes.ends_with("/escape.txt"));
    assert!(backslashes.ends_with("/win.ini"));
    assert!(dots_only.ends_with("/uploaded-file"));
    assert_confined(&app);
}

#[tokio::test]
async fn test_nul_byte_filename_uses_placeholder() {
    let app = TestApp::new();

    let path = app.upload("/evil%00.txt", "nul").await;

    assert!(path.ends_with("/uploaded-file"));
    assert_eq!(&app.get(&path).await.body[..], b"nul");
}

#[tokio::test]
async fn test_download_traversal_is_404() {
    let app = TestApp::new();
    let sandbox = app.root().parent().unwrap().to_path_buf();
    std::fs::create_dir_all(app.root()).unwrap();
    std::fs::write(sandbox.join("secret.txt"), "outside the root").unwrap();

    for attempt in [
        "/%2E%2E/secret.txt",
        "/../secret.txt",
        "/..%2F..%2Fetc/passwd",
        "/abc123/..%2F..%2Fsecret.txt",
        "/abc123/..%5Csecret.txt",
        "/./secret.txt",
    ] {
        let response = app.get(attempt).await;
        assert_eq!(
            response.status,
            StatusCode::NOT_FOUND,
            "{attempt} returned {}",
            response.status
        );
        assert!(!response.text().contains("outside the root"));
    }
}

#[tokio::test]
async fn test_identifier_directory_itself_is_not_downloadable() {
    let app = TestApp::new();
    let path = app.upload("/inner.txt", "x").await;
    let (identifier, _) = split_download_path(&path);

    let response = app.get(&format!("/{identifier}/%2E")).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_overlong_segments_are_404() {
    let app = TestApp::new();
    let path = app.upload("/file.txt", "seed").await;
    let (identifier, _) = split_download_path(&path);
    let overlong_identifier = "b".repeat(300);
    let overlong_filename = "a".repeat(300);

    for attempt in [
        format!("/{overlong_identifier}/file.txt"),
        format!("/{identifier}/{overlong_filename}"),
        format!("/abc123/{overlong_filename}"),
    ] {
        let response = app.get(&attempt).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.text(), "File not found");
    }
}

#[tokio::test]
async fn test_overlong_upload_name_leaves_nothing_behind() {
    let app = TestApp::new();
    let overlong = "c".repeat(300);

    let response = app
        .send(Method::PUT, &format!("/{overlong}"), Body::from("x"))
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "Failed to create file");
    assert!(std::fs::read_dir(app.root()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_error_bodies_do_not_leak_paths() {
    let app = TestApp::new();
    let root = app.root();

    let response = app.get("/abc123/missing.txt").await;

    assert!(!response.text().contains(&*root.to_string_lossy()));
}
