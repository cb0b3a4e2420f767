//! Shared fixtures for integration and end-to-end tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use axum::body::{Body, Bytes, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use dropbin_core::DropbinConfig;
use dropbin_core::storage::FileStore;
use dropbin_web::{AppState, DropbinApp, build_app};
use tempfile::TempDir;
use tower::ServiceExt;

/// Host header sent with every in-process request.
pub const TEST_HOST: &str = "drop.test";

/// Router over an isolated upload root.
pub struct TestApp {
    pub app: DropbinApp,
    pub config: DropbinConfig,
    _temp_dir: TempDir,
}

impl TestApp {
    /// Creates an app with the testing preset (1 MB upload limit).
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Creates an app after letting `adjust` tweak the testing preset.
    pub fn with_config(adjust: impl FnOnce(&mut DropbinConfig)) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let mut config = DropbinConfig::for_testing(&temp_dir.path().join("uploads"));
        adjust(&mut config);

        let store = FileStore::from_config(&config.storage).unwrap();
        let app = build_app(AppState::new(store), &config.server);

        Self {
            app,
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Upload root directory.
    pub fn root(&self) -> PathBuf {
        self.config.storage.upload_root()
    }

    /// Sends one request through a clone of the router.
    pub async fn send(&self, method: Method, uri: &str, body: Body) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, TEST_HOST)
            .body(body)
            .unwrap();
        send_request(self.app.clone(), request).await
    }

    /// Uploads `content` to `uri` and returns the download path from the response.
    pub async fn upload(&self, uri: &str, content: impl Into<Body>) -> String {
        let response = self.send(Method::PUT, uri, content.into()).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        download_path(&response.text())
    }

    /// Fetches `path`.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Method::GET, path, Body::empty()).await
    }
}

/// Buffered response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Runs `request` through `app` and buffers the response.
pub async fn send_request(app: DropbinApp, request: Request<Body>) -> TestResponse {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    TestResponse {
        status,
        headers,
        body,
    }
}

/// Extracts `/identifier/filename` from an upload response body.
pub fn download_path(response_body: &str) -> String {
    let url = response_body
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap()
        .trim();
    let without_scheme = url.strip_prefix("http://").unwrap();
    let slash = without_scheme.find('/').unwrap();
    without_scheme[slash..].to_string()
}

/// Splits a download path into (identifier, filename).
pub fn split_download_path(path: &str) -> (String, String) {
    let mut segments = path.trim_start_matches('/').splitn(2, '/');
    let identifier = segments.next().unwrap().to_string();
    let filename = segments.next().unwrap().to_string();
    (identifier, filename)
}

/// Lists every regular file below `root`, recursively.
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                found.push(path);
            }
        }
    }
    found
}
