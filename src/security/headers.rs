//! Header manipulation for proxied requests.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Strip caller credentials before they reach a datasource
//! - Append the client address to X-Forwarded-For
//!
//! # Design Decisions
//! - Headers a plugin explicitly allows survive credential stripping
//! - Hop-by-hop headers never survive

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use std::net::IpAddr;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Check if a header is hop-by-hop (should not be forwarded).
pub fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

fn is_caller_credential(name: &HeaderName) -> bool {
    name == header::COOKIE || name == header::AUTHORIZATION
}

/// Headers forwarded to a datasource.
///
/// `allowed` holds lowercased names the plugin lets through even when they
/// would otherwise be stripped as caller credentials. `stripped` holds
/// lowercased names that never pass, such as the auth proxy's identity
/// headers.
pub fn outbound_request_headers(inbound: &HeaderMap, allowed: &[String], stripped: &[String]) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if is_hop_by_hop_header(name.as_str()) || name == header::HOST {
            continue;
        }
        if stripped.iter().any(|s| s == name.as_str()) {
            continue;
        }
        if is_caller_credential(name) && !allowed.iter().any(|a| a == name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Headers returned to the caller from a datasource response.
pub fn inbound_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if is_hop_by_hop_header(name.as_str()) || name == header::SET_COOKIE {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Append `client` to any existing X-Forwarded-For chain.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let chain = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{existing}, {client}"),
        _ => client.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
