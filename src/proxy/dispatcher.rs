//! Datasource proxy dispatcher.
//!
//! # Responsibilities
//! - Resolve the datasource for the caller
//! - Find the plugin for the datasource type
//! - Gate the call on the path and query allow-list
//! - Normalize the proxy path and construct the proxy
//! - Hand the request to the proxy, or render the rejection
//!
//! # Design Decisions
//! - Every checkpoint is terminal on failure; nothing is retried
//! - Holds only shared, read-only collaborators; safe to call concurrently

use axum::{
    body::Body,
    http::{Request, Uri},
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ProxySettings;
use crate::datasource::DataSourceResolver;
use crate::identity::SignedInUser;
use crate::observability::metrics;
use crate::plugins::PluginRegistry;
use crate::proxy::engine::{ProxyFactory, ProxyHandler};
use crate::proxy::error::ProxyError;
use crate::proxy::path::ensure_proxy_path_trailing_slash;
use crate::proxy::validation::{is_normalized_path, is_valid_proxy_call};

/// One inbound call on the datasource proxy route.
pub struct ProxyRequest {
    /// `{id}` from the route.
    pub datasource_id: i64,
    pub user: SignedInUser,
    /// Wildcard suffix captured by the router.
    pub wildcard_path: String,
    pub request: Request<Body>,
}

/// Sequences resolution, policy, validation and delegation for proxied calls.
#[derive(Clone)]
pub struct ProxyDispatcher {
    resolver: Arc<dyn DataSourceResolver>,
    plugins: Arc<PluginRegistry>,
    factory: Arc<dyn ProxyFactory>,
    settings: ProxySettings,
}

impl ProxyDispatcher {
    pub fn new(
        resolver: Arc<dyn DataSourceResolver>,
        plugins: Arc<PluginRegistry>,
        factory: Arc<dyn ProxyFactory>,
        settings: ProxySettings,
    ) -> Self {
        Self {
            resolver,
            plugins,
            factory,
            settings,
        }
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Handle a proxied call end to end.
    pub async fn handle(&self, call: ProxyRequest) -> Response {
        let start = Instant::now();
        let datasource_id = call.datasource_id;
        let user_id = call.user.user_id;

        let prepared = self
            .prepare(datasource_id, &call.user, call.request.uri(), &call.wildcard_path)
            .await;
        let response = match prepared {
            Ok(proxy) => proxy.handle(call.request).await,
            Err(e) => {
                if e.status().is_server_error() {
                    tracing::error!(datasource_id, user_id, error = %e, "Datasource proxy call failed");
                } else {
                    tracing::warn!(datasource_id, user_id, error = %e, "Datasource proxy call rejected");
                }
                metrics::record_rejection(e.reason());
                e.to_response(self.settings.expose_error_details)
            }
        };

        metrics::record_request(response.status().as_u16(), start);
        response
    }

    /// Run every checkpoint up to and including proxy construction.
    pub async fn prepare(
        &self,
        datasource_id: i64,
        user: &SignedInUser,
        uri: &Uri,
        wildcard_path: &str,
    ) -> Result<Box<dyn ProxyHandler>, ProxyError> {
        let datasource = self
            .resolver
            .get_datasource(datasource_id, user, user.skip_cache)
            .await?;

        let plugin = self
            .plugins
            .get(&datasource.ds_type)
            .cloned()
            .ok_or_else(|| ProxyError::PluginNotFound(datasource.ds_type.clone()))?;

        let query = query_param(uri.query(), "query");
        if !is_valid_proxy_call(uri.path(), &query) {
            return Err(ProxyError::ValidationFailure);
        }

        // The router hands over the wildcard percent-decoded.
        let proxy_path = ensure_proxy_path_trailing_slash(uri.path(), wildcard_path);
        if !is_normalized_path(&proxy_path) {
            return Err(ProxyError::ValidationFailure);
        }

        Ok(self.factory.build(datasource, plugin, proxy_path)?)
    }
}

/// First value of a query-string parameter, or empty if absent.
pub fn query_param(query: Option<&str>, name: &str) -> String {
    query
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_default()
}
