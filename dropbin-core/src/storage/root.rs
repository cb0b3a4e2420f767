//! Upload root directory resolution.

use std::path::{Path, PathBuf};

/// Subdirectory of the OS temporary root used when no upload directory is configured.
pub const DEFAULT_UPLOAD_SUBDIRECTORY: &str = "uploads";

/// Resolves the directory holding all identifier directories.
///
/// A configured, non-empty path is used verbatim. Otherwise the OS temporary
/// root plus [`DEFAULT_UPLOAD_SUBDIRECTORY`] is returned. Nothing is created
/// here; writes create the directory on demand.
pub fn resolve_root(configured: Option<&Path>) -> PathBuf {
    match configured {
        Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
        _ => std::env::temp_dir().join(DEFAULT_UPLOAD_SUBDIRECTORY),
    }
}
