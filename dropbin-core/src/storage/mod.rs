//! Storage layer for uploaded files.
//!
//! Maps (identifier, filename) pairs onto `root/identifier/filename` and
//! performs the create+copy and open+stream halves of the service.

pub mod file_store;
pub mod filename;
pub mod root;

use std::io;
use std::path::PathBuf;

pub use file_store::{FileStore, StoredFile, StoredUpload};
pub use filename::{PLACEHOLDER_FILENAME, is_plain_component, normalize_component, sanitize_filename};
pub use root::{DEFAULT_UPLOAD_SUBDIRECTORY, resolve_root};

use crate::identifier::IdentifierError;

/// Errors that occur during storage operations.
///
/// Each failure point of an upload has its own variant so callers can report
/// them distinctly.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No identifier could be minted
    #[error("Identifier allocation failed: {0}")]
    Allocation(#[from] IdentifierError),

    /// Every allocated identifier was already taken on disk
    #[error("No free identifier after {attempts} attempts")]
    IdentifierExhausted {
        /// Number of identifiers tried
        attempts: u32,
    },

    /// Upload root or identifier directory could not be created
    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDirectory {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// Target file could not be created
    #[error("Failed to create file {}: {source}", path.display())]
    CreateFile {
        /// File that could not be created
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// Content stream could not be copied into the target file
    #[error("Failed to copy content into {}: {source}", path.display())]
    CopyFailed {
        /// File being written
        path: PathBuf,
        /// Underlying I/O failure, from either the stream or the file
        #[source]
        source: io::Error,
    },

    /// No file is stored under the requested pair
    #[error("File not found: {identifier}/{filename}")]
    NotFound {
        /// Requested identifier
        identifier: String,
        /// Requested filename
        filename: String,
    },

    /// Stored file exists but could not be opened
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// File being opened
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Checks if this error means the requested file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Checks if the content stream was cut off for exceeding a size limit.
    ///
    /// Callers bounding the stream signal this with `io::ErrorKind::FileTooLarge`.
    pub fn is_size_limit(&self) -> bool {
        matches!(
            self,
            StoreError::CopyFailed { source, .. } if source.kind() == io::ErrorKind::FileTooLarge
        )
    }
}
