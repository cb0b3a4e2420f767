//! Full HTTP workflow against a bound listener, including shutdown draining

use std::io;
use std::time::Duration;

use bytes::Bytes;
use dropbin_web::{ServerError, serve};
use futures::channel::mpsc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::support::{TestApp, download_path, files_under};

type ChunkSender = mpsc::UnboundedSender<Result<Bytes, io::Error>>;

/// Server task bound to an ephemeral localhost port.
struct RunningServer {
    base_url: String,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ServerError>>,
    test_app: TestApp,
}

impl RunningServer {
    async fn start(grace: Duration) -> Self {
        let test_app = TestApp::with_config(|config| config.server.shutdown_grace = grace);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(serve(
            listener,
            test_app.app.clone(),
            async move {
                let _ = stop_rx.await;
            },
            test_app.config.server.shutdown_grace,
        ));

        Self {
            base_url,
            stop: Some(stop_tx),
            handle,
            test_app,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn trigger_shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Waits for the server task, failing if it outlives `limit`.
    async fn join_within(self, limit: Duration) -> TestApp {
        let result = tokio::time::timeout(limit, self.handle)
            .await
            .expect("server did not stop in time")
            .unwrap();
        assert!(result.is_ok(), "server returned {result:?}");
        self.test_app
    }
}

fn streaming_body() -> (ChunkSender, reqwest::Body) {
    let (sender, receiver) = mpsc::unbounded();
    (sender, reqwest::Body::wrap_stream(receiver))
}

#[tokio::test]
async fn test_upload_then_download_over_http() {
    let mut server = RunningServer::start(Duration::from_secs(2)).await;
    let client = reqwest::Client::new();

    let response = client
        .put(server.url("/notes/today.txt"))
        .body("remember the milk")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);

    let text = response.text().await.unwrap();
    assert!(text.contains(&server.base_url), "url should echo the host: {text}");
    let path = download_path(&text);
    assert!(path.ends_with("/today.txt"));

    let response = client.get(server.url(&path)).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(response.text().await.unwrap(), "remember the milk");

    let response = client
        .get(server.url("/abc123/missing.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    server.trigger_shutdown();
    server.join_within(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_gzip_applied_when_requested() {
    let mut server = RunningServer::start(Duration::from_secs(2)).await;
    let client = reqwest::Client::new();
    let content = "compressible line\n".repeat(500);

    let response = client
        .put(server.url("/log.txt"))
        .body(content.clone())
        .send()
        .await
        .unwrap();
    let path = download_path(&response.text().await.unwrap());

    let response = client
        .get(server.url(&path))
        .header("accept-encoding", "gzip")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["content-encoding"], "gzip");
    let compressed = response.bytes().await.unwrap();
    assert!(compressed.len() < content.len());

    server.trigger_shutdown();
    server.join_within(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_in_flight_upload_completes_during_drain() {
    let mut server = RunningServer::start(Duration::from_secs(5)).await;
    let (chunks, body) = streaming_body();
    let url = server.url("/slow.bin");

    let upload = tokio::spawn(async move {
        reqwest::Client::new()
            .put(url)
            .body(body)
            .send()
            .await
            .unwrap()
    });

    chunks.unbounded_send(Ok(Bytes::from_static(b"first half, "))).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    server.trigger_shutdown();
    tokio::time::sleep(Duration::from_millis(100)).await;

    chunks.unbounded_send(Ok(Bytes::from_static(b"second half"))).unwrap();
    drop(chunks);

    let response = tokio::time::timeout(Duration::from_secs(5), upload)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);

    let test_app = server.join_within(Duration::from_secs(5)).await;
    let stored = files_under(&test_app.root());
    assert_eq!(stored.len(), 1);
    assert_eq!(
        std::fs::read(&stored[0]).unwrap(),
        b"first half, second half"
    );
}

#[tokio::test]
async fn test_stalled_upload_does_not_block_shutdown_past_grace() {
    let grace = Duration::from_millis(300);
    let mut server = RunningServer::start(grace).await;
    let (chunks, body) = streaming_body();
    let url = server.url("/stalled.bin");

    let upload = tokio::spawn(async move { reqwest::Client::new().put(url).body(body).send().await });

    chunks.unbounded_send(Ok(Bytes::from_static(b"never finished"))).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = tokio::time::Instant::now();
    server.trigger_shutdown();
    server.join_within(Duration::from_secs(3)).await;

    assert!(started.elapsed() >= grace);
    upload.abort();
    drop(chunks);
}

#[tokio::test]
async fn test_listener_closed_after_shutdown() {
    let mut server = RunningServer::start(Duration::from_secs(1)).await;
    let url = server.url("/favicon.ico");

    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    server.trigger_shutdown();
    server.join_within(Duration::from_secs(5)).await;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    assert!(client.get(&url).send().await.is_err());
}
