//! Dropbin Web - HTTP surface for anonymous file drops
//!
//! `PUT` any path to upload, `GET /{identifier}/{filename}` to download.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]

pub mod error;
pub mod handlers;
pub mod server;

// Re-export main types
pub use error::{ApiError, ServerError};
pub use server::{AppState, DropbinApp, build_app, build_router, run_server, serve, shutdown_signal};
