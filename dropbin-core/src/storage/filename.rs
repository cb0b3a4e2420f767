//! Filename derivation for uploads.

use std::borrow::Cow;

/// Name given to uploads whose request path carries no usable filename.
pub const PLACEHOLDER_FILENAME: &str = "uploaded-file";

/// Derives the stored filename from a raw request path.
///
/// Percent-decodes the path, then keeps only its final component. Traversal
/// segments can therefore never reach the filesystem.
///
/// # Examples
/// ```
/// use dropbin_core::storage::sanitize_filename;
///
/// assert_eq!(sanitize_filename("/ignored/name.txt"), "name.txt");
/// assert_eq!(sanitize_filename("/../../etc/passwd"), "passwd");
/// assert_eq!(sanitize_filename("/"), "uploaded-file");
/// ```
pub fn sanitize_filename(raw_path: &str) -> String {
    let decoded = urlencoding::decode(raw_path).unwrap_or(Cow::Borrowed(raw_path));
    normalize_component(&decoded)
}

/// Reduces `name` to a single safe path component.
///
/// Idempotent: a normalized name passes through unchanged.
pub fn normalize_component(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();

    if is_plain_component(last) {
        last.to_string()
    } else {
        PLACEHOLDER_FILENAME.to_string()
    }
}

/// Checks that `segment` names exactly one entry inside its parent directory.
pub fn is_plain_component(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}
