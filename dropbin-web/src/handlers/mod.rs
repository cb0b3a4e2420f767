//! HTTP request handlers organized by functionality

pub mod download;
pub mod favicon;
pub mod upload;

// Re-export handler functions
pub use download::download_file;
pub use favicon::{FAVICON_SVG, favicon};
pub use upload::{download_url, request_host, upload_file};
