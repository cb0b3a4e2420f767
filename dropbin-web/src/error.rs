//! Error types for the HTTP layer

use std::io;
use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dropbin_core::{IdentifierError, StoreError};
use tracing::{error, warn};

/// Request-level failures, rendered as plain-text responses.
///
/// Internal causes are logged; clients only ever see a fixed message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Nothing is stored under the requested pair
    #[error("File not found: {identifier}/{filename}")]
    NotFound {
        /// Requested identifier
        identifier: String,
        /// Requested filename
        filename: String,
    },

    /// Request body exceeded the configured upload limit
    #[error("Upload exceeds size limit")]
    PayloadTooLarge,

    /// Any other storage failure
    #[error("Storage failure: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        if error.is_size_limit() {
            return ApiError::PayloadTooLarge;
        }
        match error {
            StoreError::NotFound {
                identifier,
                filename,
            } => ApiError::NotFound {
                identifier,
                filename,
            },
            other => ApiError::Storage(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound { .. } => (StatusCode::NOT_FOUND, "File not found"),
            ApiError::PayloadTooLarge => {
                warn!("Rejected upload over size limit");
                (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "Upload exceeds the maximum allowed size",
                )
            }
            ApiError::Storage(cause) => {
                error!("Request failed: {cause}");
                (StatusCode::INTERNAL_SERVER_ERROR, storage_message(cause))
            }
        };

        (status, message).into_response()
    }
}

fn storage_message(error: &StoreError) -> &'static str {
    match error {
        StoreError::Allocation(_)
        | StoreError::IdentifierExhausted { .. }
        | StoreError::CreateDirectory { .. } => "Failed to create upload directory",
        StoreError::CreateFile { .. } => "Failed to create file",
        StoreError::CopyFailed { .. } => "Failed to save file",
        StoreError::NotFound { .. } | StoreError::Read { .. } => "Failed to read file",
    }
}

/// Failures that stop the server itself.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Upload store could not be constructed from configuration
    #[error("Invalid storage configuration: {0}")]
    Store(#[from] IdentifierError),

    /// Listener could not bind its address
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: SocketAddr,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// Accept loop failed
    #[error("Server I/O error: {0}")]
    Io(#[from] io::Error),

    /// Server task panicked or was cancelled
    #[error("Server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
