//! Proxy execution engine.
//!
//! # Responsibilities
//! - Validate the datasource URL when a proxy is constructed
//! - Rewrite the request onto the datasource base URL
//! - Sanitize headers and inject datasource credentials
//! - Stream the upstream response back to the caller
//!
//! # Design Decisions
//! - One proxy per request; nothing survives the request
//! - No retries: an upstream failure is a 502
//! - Plain HTTP upstreams only (the client has no TLS connector)

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderValue, Request, StatusCode, Uri},
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::schema::TimeoutConfig;
use crate::datasource::{DataSource, DataSourceAccess};
use crate::http::response::json_api_error;
use crate::observability::metrics;
use crate::plugins::DataSourcePlugin;
use crate::proxy::validation::ALLOWED_ENDPOINT_PREFIX;
use crate::security::headers::{append_forwarded_for, inbound_response_headers, outbound_request_headers};

/// Errors raised while constructing a proxy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyBuildError {
    /// The datasource's configured URL is malformed.
    #[error("invalid datasource url {url:?}: {reason}")]
    UrlValidation { url: String, reason: String },

    #[error("datasource {0} uses direct access and is not proxied")]
    DirectAccess(i64),

    #[error("unsupported upstream scheme {0:?}")]
    UnsupportedScheme(String),

    /// URL normalization moved the forwarded path off the allowed endpoints.
    #[error("upstream path {0:?} is outside the allowed endpoints")]
    PathNotAllowed(String),

    #[error("{0}")]
    Other(String),
}

/// Executes one proxied request.
#[async_trait]
pub trait ProxyHandler: Send {
    async fn handle(self: Box<Self>, request: Request<Body>) -> Response;
}

/// Constructs a proxy for a resolved datasource and normalized proxy path.
pub trait ProxyFactory: Send + Sync {
    fn build(
        &self,
        datasource: Arc<DataSource>,
        plugin: DataSourcePlugin,
        proxy_path: String,
    ) -> Result<Box<dyn ProxyHandler>, ProxyBuildError>;
}

/// Parse a datasource URL, defaulting to `http://` when no scheme is given.
pub fn validate_datasource_url(raw: &str) -> Result<Url, ProxyBuildError> {
    let invalid = |reason: String| ProxyBuildError::UrlValidation {
        url: raw.to_string(),
        reason,
    };

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let url = Url::parse(&candidate).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("scheme {:?} is not http or https", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// Join two URL path fragments with exactly one slash between them.
pub fn join_url_fragments(base: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return base.to_string();
    }
    match (base.ends_with('/'), suffix.starts_with('/')) {
        (true, true) => format!("{base}{}", &suffix[1..]),
        (false, false) => format!("{base}/{suffix}"),
        _ => format!("{base}{suffix}"),
    }
}

/// Base URL with the proxy path appended, after URL normalization.
///
/// Fails unless the normalized path still sits under the allowed endpoint
/// prefix of the base path.
pub fn upstream_target(base_url: &Url, proxy_path: &str) -> Result<Url, ProxyBuildError> {
    let mut target = base_url.clone();
    target.set_path(&join_url_fragments(base_url.path(), proxy_path));
    target.set_query(None);
    target.set_fragment(None);

    let allowed = join_url_fragments(base_url.path(), ALLOWED_ENDPOINT_PREFIX);
    if !target.path().starts_with(&allowed) {
        return Err(ProxyBuildError::PathNotAllowed(target.path().to_string()));
    }
    Ok(target)
}

/// Builds `DataSourceProxy` instances sharing one HTTP client.
#[derive(Clone)]
pub struct HttpProxyFactory {
    client: Client<HttpConnector, Body>,
    stripped_headers: Arc<[String]>,
}

impl HttpProxyFactory {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            stripped_headers: Arc::from(Vec::new()),
        }
    }

    /// Request headers (lowercased) removed before forwarding, whatever the plugin allows.
    pub fn strip_request_headers(mut self, names: Vec<String>) -> Self {
        self.stripped_headers = Arc::from(names);
        self
    }
}

impl ProxyFactory for HttpProxyFactory {
    fn build(
        &self,
        datasource: Arc<DataSource>,
        plugin: DataSourcePlugin,
        proxy_path: String,
    ) -> Result<Box<dyn ProxyHandler>, ProxyBuildError> {
        let base_url = validate_datasource_url(&datasource.url)?;

        if datasource.access == DataSourceAccess::Direct {
            return Err(ProxyBuildError::DirectAccess(datasource.id));
        }
        if base_url.scheme() != "http" {
            return Err(ProxyBuildError::UnsupportedScheme(base_url.scheme().to_string()));
        }

        let target = upstream_target(&base_url, &proxy_path)?;

        Ok(Box::new(DataSourceProxy {
            datasource,
            plugin,
            target,
            stripped_headers: self.stripped_headers.clone(),
            client: self.client.clone(),
        }))
    }
}

/// Forwards one request to a datasource.
pub struct DataSourceProxy {
    datasource: Arc<DataSource>,
    plugin: DataSourcePlugin,
    /// Upstream URL without the query.
    target: Url,
    stripped_headers: Arc<[String]>,
    client: Client<HttpConnector, Body>,
}

impl DataSourceProxy {
    /// Target URI: base URL path + proxy path, with the caller's query.
    pub fn upstream_uri(&self, query: Option<&str>) -> Result<Uri, ProxyBuildError> {
        let mut target = self.target.clone();
        target.set_query(query);

        target
            .as_str()
            .parse::<Uri>()
            .map_err(|e| ProxyBuildError::Other(format!("cannot build upstream uri: {e}")))
    }

    fn basic_auth_header(&self) -> Option<HeaderValue> {
        let user = self.datasource.basic_auth_user.as_deref()?;
        let password = self.datasource.basic_auth_password.as_deref().unwrap_or_default();
        let encoded = STANDARD.encode(format!("{user}:{password}"));
        HeaderValue::from_str(&format!("Basic {encoded}")).ok()
    }
}

#[async_trait]
impl ProxyHandler for DataSourceProxy {
    async fn handle(self: Box<Self>, request: Request<Body>) -> Response {
        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let (parts, body) = request.into_parts();

        let uri = match self.upstream_uri(parts.uri.query()) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(datasource_id = self.datasource.id, error = %e, "Upstream URI rejected");
                return json_api_error(StatusCode::BAD_GATEWAY, "Bad Gateway", None);
            }
        };

        let mut headers = outbound_request_headers(
            &parts.headers,
            &self.plugin.allowed_headers,
            &self.stripped_headers,
        );
        if let Some(ip) = client_ip {
            append_forwarded_for(&mut headers, ip);
        }
        if let Some(auth) = self.basic_auth_header() {
            headers.insert(header::AUTHORIZATION, auth);
        }

        let mut upstream = match Request::builder().method(parts.method.clone()).uri(uri.clone()).body(body) {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(datasource_id = self.datasource.id, error = %e, "Failed to build upstream request");
                return json_api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed creating data source proxy", None);
            }
        };
        *upstream.headers_mut() = headers;

        tracing::debug!(
            datasource_id = self.datasource.id,
            plugin = %self.plugin.id,
            method = %parts.method,
            upstream = %uri,
            "Forwarding to datasource"
        );

        match self.client.request(upstream).await {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                parts.headers = inbound_response_headers(&parts.headers);
                metrics::record_upstream_response(&self.plugin.id, parts.status.as_u16());
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                tracing::error!(
                    datasource_id = self.datasource.id,
                    upstream = %uri,
                    error = %e,
                    "Upstream error"
                );
                metrics::record_upstream_response(&self.plugin.id, StatusCode::BAD_GATEWAY.as_u16());
                json_api_error(StatusCode::BAD_GATEWAY, "Bad Gateway", None)
            }
        }
    }
}
