//! Upload handler: `PUT` on any path stores the body under a new identifier.

use std::io;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use dropbin_core::Identifier;
use dropbin_core::storage::sanitize_filename;
use futures::TryStreamExt;
use http_body_util::LengthLimitError;
use tokio_util::io::StreamReader;
use tracing::info;

use crate::error::ApiError;
use crate::server::AppState;

/// Stores the request body and answers with its download URL.
///
/// The filename is the last segment of the request path. Body size is bounded
/// by the router's limit layer before bytes reach the store.
///
/// # Errors
///
/// - `ApiError::PayloadTooLarge` - If the body exceeded the upload limit mid-stream
/// - `ApiError::Storage` - If the directory, file or copy step failed
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    body: Body,
) -> Result<(StatusCode, String), ApiError> {
    let filename = sanitize_filename(uri.path());
    let content = StreamReader::new(body.into_data_stream().map_err(body_error_to_io));

    let upload = state.store.write(&filename, content).await?;

    let url = download_url(&request_host(&headers, &uri), &upload.identifier, &upload.filename);
    info!(
        identifier = %upload.identifier,
        bytes = upload.bytes_written,
        "Upload available at {url}"
    );

    Ok((
        StatusCode::CREATED,
        format!("File uploaded successfully. Download at:\n{url}\n"),
    ))
}

/// Host the client addressed, used to build download URLs.
///
/// Prefers the `Host` header, then the URI authority (HTTP/2), then `localhost`.
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|host| !host.is_empty())
        .map(str::to_owned)
        .or_else(|| uri.authority().map(|authority| authority.to_string()))
        .unwrap_or_else(|| "localhost".to_string())
}

/// Builds `http://host/identifier/filename` with the filename percent-encoded.
pub fn download_url(host: &str, identifier: &Identifier, filename: &str) -> String {
    format!(
        "http://{host}/{identifier}/{}",
        urlencoding::encode(filename)
    )
}

fn body_error_to_io(error: axum::Error) -> io::Error {
    let inner = error.into_inner();
    if inner.is::<LengthLimitError>() {
        io::Error::new(io::ErrorKind::FileTooLarge, inner)
    } else {
        io::Error::other(inner)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use dropbin_core::IdentifierAllocator;

    use super::*;

    #[test]
    fn test_host_header_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("files.example.com:8080"));
        let uri: Uri = "http://other.example/x".parse().unwrap();

        assert_eq!(request_host(&headers, &uri), "files.example.com:8080");
    }

    #[test]
    fn test_host_falls_back_to_authority_then_localhost() {
        let uri: Uri = "http://authority.example/x".parse().unwrap();
        assert_eq!(request_host(&HeaderMap::new(), &uri), "authority.example");

        let uri: Uri = "/x".parse().unwrap();
        assert_eq!(request_host(&HeaderMap::new(), &uri), "localhost");
    }

    #[test]
    fn test_download_url_encodes_filename() {
        let identifier = IdentifierAllocator::os(6).unwrap().generate().unwrap();

        let url = download_url("host", &identifier, "my notes.md");

        assert_eq!(url, format!("http://host/{identifier}/my%20notes.md"));
    }

    #[test]
    fn test_other_body_errors_stay_generic() {
        let error = axum::Error::new(io::Error::other("reset"));
        assert_eq!(body_error_to_io(error).kind(), io::ErrorKind::Other);
    }
}
