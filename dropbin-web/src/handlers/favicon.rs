//! Inline favicon so browsers stop logging 404s.

use axum::http::header;
use axum::response::IntoResponse;

/// Blue square with a white disc.
pub const FAVICON_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100">
	<rect width="100" height="100" fill="#4a90e2"/>
	<circle cx="50" cy="50" r="40" fill="#fff"/>
</svg>"##;

/// Serves the favicon as `image/svg+xml`.
pub async fn favicon() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/svg+xml")], FAVICON_SVG)
}
