//! Integration tests for Dropbin
//!
//! Drive the assembled router in-process, from request parsing through the
//! middleware stack down to files on disk.

#[path = "support.rs"]
mod support;

#[path = "integration/upload_download.rs"]
mod upload_download;

#[path = "integration/path_safety.rs"]
mod path_safety;

#[path = "integration/limits.rs"]
mod limits;

#[path = "integration/ranges.rs"]
mod ranges;
