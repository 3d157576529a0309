//! Allow-list validation of proxied calls.
//!
//! Only Prometheus-style instant and range queries are forwarded. Both the
//! URL path and the `query` parameter are checked against fixed prefix
//! grammars; anything after the matched prefix is accepted, except dot
//! segments, which would let URL normalization walk the forwarded path out
//! of the allowed endpoints.
//!
//! # Design Decisions
//! - Hand-written prefix matching, no regex in the hot path
//! - Pure functions; producing the rejection response is the caller's job

const PROXY_PATH_PREFIX: &str = "/api/datasources/proxy/";
const API_V1_SEGMENT: &str = "/api/v1/";

/// Endpoint prefix every forwarded path keeps relative to the datasource URL.
pub const ALLOWED_ENDPOINT_PREFIX: &str = "api/v1/query";

/// Label selector accepted verbatim as a query value.
///
/// Compared as literal text: `\w+\.*` is not interpreted as a pattern.
pub const LABEL_SELECTOR_QUERY: &str = r"{__name__=~'\w+\.*'}";

/// Returns true if both the request path and the `query` value are allowed.
pub fn is_valid_proxy_call(request_path: &str, query: &str) -> bool {
    is_valid_proxy_path(request_path) && is_valid_query(query)
}

/// `/api/datasources/proxy/<digits>/api/v1/query` or `.../query_range`,
/// free of dot segments.
pub fn is_valid_proxy_path(path: &str) -> bool {
    if !is_normalized_path(path) {
        return false;
    }

    let Some(rest) = path.strip_prefix(PROXY_PATH_PREFIX) else {
        return false;
    };

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return false;
    }

    // `query_range` shares the `query` prefix.
    rest[digits..]
        .strip_prefix(API_V1_SEGMENT)
        .is_some_and(|endpoint| endpoint.starts_with("query"))
}

/// False if any segment is `.` or `..`, literal or percent-encoded, or if
/// the path holds a backslash (read as a separator by URL parsers).
pub fn is_normalized_path(path: &str) -> bool {
    !path.contains('\\') && path.split('/').all(|segment| !is_dot_segment(segment))
}

fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

/// A bare identifier (`[A-Za-z0-9_]+`) or the literal label selector.
pub fn is_valid_query(query: &str) -> bool {
    let starts_with_word = query
        .bytes()
        .next()
        .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_');

    starts_with_word || query.starts_with(LABEL_SELECTOR_QUERY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_paths() {
        assert!(is_valid_proxy_path("/api/datasources/proxy/1/api/v1/query"));
        assert!(is_valid_proxy_path("/api/datasources/proxy/42/api/v1/query_range"));
        assert!(is_valid_proxy_path("/api/datasources/proxy/007/api/v1/query/"));
        // Only the prefix is constrained.
        assert!(is_valid_proxy_path("/api/datasources/proxy/7/api/v1/query_exemplars"));
    }

    #[test]
    fn test_rejected_paths() {
        for path in [
            "",
            "/",
            "/api/datasources/proxy/",
            "/api/datasources/proxy/abc/api/v1/query",
            "/api/datasources/proxy//api/v1/query",
            "/api/datasources/proxy/-1/api/v1/query",
            "/api/datasources/proxy/1/api/v1/labels",
            "/api/datasources/proxy/1/api/v1/series",
            "/api/datasources/proxy/1/api/v2/query",
            "/api/datasources/proxy/1/api/v1/Query",
            "/api/datasources/proxy/1/query",
            "/x/api/datasources/proxy/1/api/v1/query",
            "/api/datasources/proxy/1/../api/v1/query",
        ] {
            assert!(!is_valid_proxy_path(path), "{path} should be rejected");
        }
    }

    #[test]
    fn test_dot_segments_after_prefix_rejected() {
        for path in [
            "/api/datasources/proxy/1/api/v1/query/../../../admin/tsdb/delete_series",
            "/api/datasources/proxy/1/api/v1/query/%2e%2e/%2e%2e/admin",
            "/api/datasources/proxy/1/api/v1/query/.%2E/admin",
            "/api/datasources/proxy/1/api/v1/query/./x",
            "/api/datasources/proxy/1/api/v1/query\\..\\admin",
        ] {
            assert!(!is_valid_proxy_path(path), "{path} should be rejected");
            assert!(!is_valid_proxy_call(path, "up"), "{path} should be rejected");
        }
    }

    #[test]
    fn test_normalized_path() {
        assert!(is_normalized_path("api/v1/query_range"));
        assert!(is_normalized_path("api/v1/query/"));
        assert!(is_normalized_path("api/v1/query/..."));
        assert!(is_normalized_path("api/v1/query/a..b"));
        assert!(!is_normalized_path("api/v1/query/../../admin"));
        assert!(!is_normalized_path("api/v1/query/%2E%2e/admin"));
        assert!(!is_normalized_path("api/v1/query/%2e"));
        assert!(!is_normalized_path("api\\v1"));
    }

    #[test]
    fn test_non_ascii_digits_rejected() {
        assert!(!is_valid_proxy_path("/api/datasources/proxy/\u{0661}/api/v1/query"));
    }

    #[test]
    fn test_identifier_queries() {
        assert!(is_valid_query("up"));
        assert!(is_valid_query("_"));
        assert!(is_valid_query("node_cpu_seconds_total"));
        assert!(is_valid_query("9"));
        // Trailing content after the identifier is not constrained.
        assert!(is_valid_query("rate(http_requests_total[5m])"));
        assert!(is_valid_query("up{job=\"api\"}"));
    }

    #[test]
    fn test_rejected_queries() {
        assert!(!is_valid_query(""));
        assert!(!is_valid_query(" up"));
        assert!(!is_valid_query("{job=\"api\"}"));
        assert!(!is_valid_query("(up)"));
        assert!(!is_valid_query("-1"));
    }

    #[test]
    fn test_label_selector_is_literal() {
        assert!(is_valid_query(r"{__name__=~'\w+\.*'}"));
        assert!(is_valid_query(r"{__name__=~'\w+\.*'} or up"));
        assert!(!is_valid_query(r"{__name__=~'\w+\.*}"));
        assert!(!is_valid_query(r"{__name__=~'up.*'}"));
        assert!(!is_valid_query(r"{__name__=~'node_\w+\.*'}"));
    }

    #[test]
    fn test_both_checks_required() {
        assert!(is_valid_proxy_call("/api/datasources/proxy/7/api/v1/query", "up"));
        assert!(!is_valid_proxy_call("/api/datasources/proxy/7/api/v1/query", ""));
        assert!(!is_valid_proxy_call("/api/datasources/proxy/7/api/v1/labels", "up"));
    }
}
