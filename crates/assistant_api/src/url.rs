/// Default base URL for a locally hosted assistant backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Join a base URL and an endpoint path with exactly one separating slash.
///
/// An empty or whitespace-only base falls back to [`DEFAULT_BASE_URL`].
pub fn endpoint_url(base: &str, path: &str) -> String {
    let base = if base.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        base.trim()
    };

    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
