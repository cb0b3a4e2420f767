//! End-to-end tests for Dropbin
//!
//! These tests bind a real listener and talk to it over HTTP, covering the
//! upload/download workflow and the graceful shutdown lifecycle.

#[path = "../support.rs"]
mod support;

mod server_lifecycle;
