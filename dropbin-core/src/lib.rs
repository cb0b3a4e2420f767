//! Dropbin Core - identifier allocation and upload storage
//!
//! Anonymous uploads are stored under short random identifiers; the pair
//! (identifier, filename) is the only key needed to read a file back.
//! This crate mints the identifiers, maps pairs onto the filesystem and
//! performs the writes and reads. HTTP concerns live in `dropbin-web`.

pub mod config;
pub mod identifier;
pub mod storage;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::DropbinConfig;
pub use identifier::{Identifier, IdentifierAllocator, IdentifierError, RandomSource};
pub use storage::{FileStore, StoreError};

/// Core errors that can bubble up from any Dropbin subsystem.
#[derive(Debug, thiserror::Error)]
pub enum DropbinError {
    #[error("Identifier error: {0}")]
    Identifier(#[from] IdentifierError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DropbinError {
    /// Returns a user-friendly error message suitable for display.
    ///
    /// Never includes filesystem paths.
    pub fn user_message(&self) -> String {
        match self {
            DropbinError::Identifier(_) => "Could not allocate an upload identifier".to_string(),
            DropbinError::Storage(e) if e.is_not_found() => "File not found".to_string(),
            DropbinError::Storage(_) => "Storage error occurred".to_string(),
            DropbinError::Configuration { reason } => format!("Configuration error: {reason}"),
            DropbinError::Io(_) => "File system error occurred".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DropbinError>;
