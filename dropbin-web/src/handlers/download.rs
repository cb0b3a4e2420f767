//! Download handler for `GET /{identifier}/{filename}`

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

use crate::error::ApiError;
use crate::server::AppState;

/// Serves a stored file back to the client.
///
/// The store validates the pair first; the file itself goes out through
/// `ServeFile`, which guesses the content type from the extension and answers
/// `Range` (206/416) and `If-Modified-Since` (304) requests.
///
/// # Errors
///
/// - `ApiError::NotFound` - If nothing is stored under the pair
/// - `ApiError::Storage` - If the file exists but its metadata could not be read
pub async fn download_file(
    State(state): State<AppState>,
    Path((identifier, filename)): Path<(String, String)>,
    request: Request,
) -> Result<Response, ApiError> {
    let path = state.store.locate(&identifier, &filename).await?;
    debug!(identifier = %identifier, filename = %filename, "Serving download");

    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    Ok(response.map(Body::new).into_response())
}
