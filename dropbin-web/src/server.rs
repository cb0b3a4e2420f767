//! Router assembly and server lifecycle
//!
//! Wires the upload/download handlers behind the ambient middleware stack
//! (request tracing, CORS, gzip, body limit, trailing-slash trimming) and runs
//! the listener until a shutdown signal, draining in-flight requests for at
//! most the configured grace period.

use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::ServiceExt;
use axum::extract::Request;
use axum::routing::{get, put};
use dropbin_core::DropbinConfig;
use dropbin_core::config::ServerConfig;
use dropbin_core::storage::FileStore;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::Layer;
use tower_http::CompressionLevel;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::ServerError;
use crate::handlers::{download_file, favicon, upload_file};

/// Fully assembled application: the router behind trailing-slash trimming.
pub type DropbinApp = NormalizePath<Router>;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Upload store all handlers read from and write to
    pub store: Arc<FileStore>,
}

impl AppState {
    /// Wraps a store for sharing across requests.
    pub fn new(store: FileStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// Builds the routed application with its middleware stack.
///
/// `PUT` is accepted on every path; the two `GET` routes serve downloads and
/// the favicon. Other methods on unmatched paths get `404`.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/favicon.ico", get(favicon).put(upload_file))
        .route(
            "/{identifier}/{filename}",
            get(download_file).put(upload_file),
        )
        .fallback(put(upload_file).fallback(not_found))
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes()))
        .layer(
            CompressionLayer::new().quality(CompressionLevel::Precise(config.compression_level)),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the router and trims trailing slashes before routing.
pub fn build_app(state: AppState, config: &ServerConfig) -> DropbinApp {
    NormalizePathLayer::trim_trailing_slash().layer(build_router(state, config))
}

async fn not_found() -> (axum::http::StatusCode, &'static str) {
    (axum::http::StatusCode::NOT_FOUND, "Not Found")
}

/// Runs the server described by `config` until `shutdown` resolves.
///
/// # Errors
///
/// - `ServerError::Store` - If the storage configuration is invalid
/// - `ServerError::Bind` - If the listener cannot bind its address
/// - `ServerError::Io` - If the accept loop fails
/// - `ServerError::Task` - If the server task panics
pub async fn run_server<F>(config: DropbinConfig, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = FileStore::from_config(&config.storage)?;
    info!("Uploads stored under {}", store.root().display());

    let app = build_app(AppState::new(store), &config.server);
    let addr = config.server.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    info!("Server starting on port {}...", config.server.effective_port());
    serve(listener, app, shutdown, config.server.shutdown_grace).await
}

/// Serves `app` on `listener` with a bounded graceful drain.
///
/// Once `shutdown` resolves the listener stops accepting connections and
/// in-flight requests get `grace` to finish. After that the server stops
/// waiting and returns; leftover connections end with the runtime.
///
/// # Errors
///
/// - `ServerError::Io` - If the accept loop fails
/// - `ServerError::Task` - If the server task panics
pub async fn serve<F>(
    listener: TcpListener,
    app: DropbinApp,
    shutdown: F,
    grace: Duration,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (drain_tx, drain_rx) = oneshot::channel::<()>();
    let graceful = async move {
        shutdown.await;
        info!("Shutdown requested, draining in-flight requests");
        let _ = drain_tx.send(());
    };

    let server = axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(graceful);
    let mut server_task = tokio::spawn(server.into_future());

    let drain_deadline = async move {
        match drain_rx.await {
            Ok(()) => tokio::time::sleep(grace).await,
            // Server finished without a shutdown request.
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        joined = &mut server_task => {
            joined??;
            info!("Server stopped");
            Ok(())
        }
        () = drain_deadline => {
            warn!("Drain deadline of {grace:?} elapsed, abandoning remaining connections");
            server_task.abort();
            Ok(())
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
///
/// If a handler cannot be installed the error is logged and that signal is
/// ignored.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, StatusCode, header};
    use dropbin_core::IdentifierAllocator;
    use tempfile::TempDir;
    use tower::ServiceExt as _;

    use super::*;

    fn create_test_app() -> (DropbinApp, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(
            temp_dir.path().to_path_buf(),
            IdentifierAllocator::os(6).unwrap(),
        );
        let app = build_app(AppState::new(store), &ServerConfig::default());
        (app, temp_dir)
    }

    async fn send(
        app: DropbinApp,
        method: Method,
        uri: &str,
        body: &'static str,
    ) -> (StatusCode, String) {
        let request = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "drop.test")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_put_on_root_uses_placeholder_name() {
        let (app, _temp_dir) = create_test_app();

        let (status, body) = send(app, Method::PUT, "/", "data").await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body.trim_end().ends_with("/uploaded-file"));
    }

    #[tokio::test]
    async fn test_trailing_slash_trimmed_before_naming() {
        let (app, _temp_dir) = create_test_app();

        let (status, body) = send(app, Method::PUT, "/docs/readme.md/", "# hi").await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body.trim_end().ends_with("/readme.md"));
    }

    #[tokio::test]
    async fn test_put_on_deep_path() {
        let (app, _temp_dir) = create_test_app();

        let (status, body) = send(app, Method::PUT, "/a/b/c/d.txt", "deep").await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body.starts_with("File uploaded successfully. Download at:\nhttp://drop.test/"));
    }

    #[tokio::test]
    async fn test_get_on_unrouted_path_is_404() {
        let (app, _temp_dir) = create_test_app();

        let (status, _) = send(app, Method::GET, "/only-one-segment", "").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_favicon_is_svg() {
        let (app, _temp_dir) = create_test_app();
        let request = axum::http::Request::builder()
            .uri("/favicon.ico")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let (app, _temp_dir) = create_test_app();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(serve(
            listener,
            app,
            async move {
                let _ = stop_rx.await;
            },
            Duration::from_secs(5),
        ));
        stop_tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
