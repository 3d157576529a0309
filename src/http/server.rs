//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router for the datasource proxy and sign-up routes
//! - Wire up middleware (identity, body limit, timeout, request ID, tracing)
//! - Provision configured datasources and start the sign-up workflow
//! - Apply reloaded configuration without dropping in-flight requests

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware,
    response::Response,
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::accounts::{AccountStore, InMemoryAccountStore, UserSetupService};
use crate::config::ProxyConfig;
use crate::datasource::{DataSourceCache, InMemoryDataSourceStore};
use crate::events::{EventBus, SignUpCompleted};
use crate::http::middleware::identity_middleware;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::signup::signup_handler;
use crate::identity::SignedInUser;
use crate::lifecycle::shutdown::wait as wait_for_shutdown;
use crate::plugins::PluginRegistry;
use crate::proxy::{HttpProxyFactory, ProxyDispatcher, ProxyRequest};

const SIGNUP_BUS_CAPACITY: usize = 64;

/// Everything derived from one configuration snapshot.
pub struct InnerState {
    pub config: ProxyConfig,
    pub dispatcher: ProxyDispatcher,
}

impl InnerState {
    fn build(config: ProxyConfig, cache: Arc<DataSourceCache>) -> Self {
        let plugins = Arc::new(PluginRegistry::from_configs(&config.plugins));
        let factory = Arc::new(
            HttpProxyFactory::new(&config.timeouts).strip_request_headers(config.auth.identity_headers()),
        );
        let dispatcher = ProxyDispatcher::new(cache, plugins, factory, config.proxy.clone());
        Self { config, dispatcher }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<InnerState>>,
    pub accounts: Arc<dyn AccountStore>,
    pub signups: EventBus<SignUpCompleted>,
}

/// HTTP server for the datasource proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
    datasources: Arc<InMemoryDataSourceStore>,
    cache: Arc<DataSourceCache>,
}

impl HttpServer {
    /// Create a server with fresh in-memory stores.
    pub fn new(config: ProxyConfig) -> Self {
        Self::with_stores(
            config,
            Arc::new(InMemoryDataSourceStore::new()),
            Arc::new(InMemoryAccountStore::with_server_admin()),
        )
    }

    /// Create a server over existing stores.
    pub fn with_stores(
        config: ProxyConfig,
        datasources: Arc<InMemoryDataSourceStore>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        if let Err(e) = datasources.provision(&config.datasources) {
            tracing::error!(error = %e, "Datasource provisioning failed");
        }

        let cache = Arc::new(DataSourceCache::new(
            datasources.clone(),
            Duration::from_secs(config.cache.datasource_ttl_secs),
        ));

        let state = AppState {
            inner: Arc::new(ArcSwap::from_pointee(InnerState::build(config, cache.clone()))),
            accounts,
            signups: EventBus::new(SIGNUP_BUS_CAPACITY),
        };

        let router = Self::build_router(&state.inner.load().config, state.clone());
        Self {
            router,
            state,
            datasources,
            cache,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Body limit and request timeout are fixed at startup.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route(
                "/api/datasources/proxy/{id}",
                get(proxy_handler).post(proxy_handler),
            )
            .route(
                "/api/datasources/proxy/{id}/",
                get(proxy_handler).post(proxy_handler),
            )
            .route(
                "/api/datasources/proxy/{id}/{*path}",
                get(proxy_handler).post(proxy_handler),
            )
            .route_layer(middleware::from_fn_with_state(state.clone(), identity_middleware))
            .route("/api/user/signup", post(signup_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.proxy.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configs received on `config_updates` replace the current snapshot.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let provisioning = self.state.inner.load().config.provisioning.clone();
        if provisioning.enabled {
            let setup = Arc::new(UserSetupService::new(
                self.state.accounts.clone(),
                self.datasources.clone(),
                provisioning,
            ));
            setup.init(&self.state.signups, shutdown.resubscribe());
        }

        let reloader = Reloader {
            inner: self.state.inner.clone(),
            datasources: self.datasources.clone(),
            cache: self.cache.clone(),
        };
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => reloader.apply(config),
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<InnerState> {
        self.state.inner.load_full()
    }
}

/// Swaps in new configuration snapshots.
struct Reloader {
    inner: Arc<ArcSwap<InnerState>>,
    datasources: Arc<InMemoryDataSourceStore>,
    cache: Arc<DataSourceCache>,
}

impl Reloader {
    fn apply(&self, config: ProxyConfig) {
        let current = self.inner.load_full();
        if current.config.listener.bind_address != config.listener.bind_address {
            tracing::warn!(
                current = %current.config.listener.bind_address,
                requested = %config.listener.bind_address,
                "Listener address changes need a restart"
            );
        }
        drop(current);

        if let Err(e) = self.datasources.provision(&config.datasources) {
            tracing::error!(error = %e, "Datasource re-provisioning failed, keeping previous config");
            return;
        }
        self.cache.clear();

        let plugins = config.plugins.len();
        self.inner.store(Arc::new(InnerState::build(config, self.cache.clone())));
        tracing::info!(plugins, "Configuration reloaded");
    }
}

#[derive(Debug, Deserialize)]
struct ProxyRouteParams {
    id: i64,
    #[serde(default)]
    path: String,
}

/// Datasource proxy route. The snapshot is pinned for the whole request.
async fn proxy_handler(
    State(state): State<AppState>,
    Path(params): Path<ProxyRouteParams>,
    Extension(user): Extension<SignedInUser>,
    request: Request<Body>,
) -> Response {
    let inner = state.inner.load_full();
    inner
        .dispatcher
        .handle(ProxyRequest {
            datasource_id: params.id,
            user,
            wildcard_path: params.path,
            request,
        })
        .await
}
