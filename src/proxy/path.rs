//! Proxy path normalization.

/// Restore a trailing slash the router dropped from the wildcard suffix.
///
/// The wildcard capture loses the trailing slash of the original URL, and
/// upstreams may treat `/foo` and `/foo/` as different resources.
pub fn ensure_proxy_path_trailing_slash(original_path: &str, proxy_path: &str) -> String {
    if proxy_path.len() > 1 && original_path.ends_with('/') && !proxy_path.ends_with('/') {
        return format!("{proxy_path}/");
    }
    proxy_path.to_string()
}
