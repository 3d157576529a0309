//! Datasource proxy server.
//!
//! ```text
//!   caller ──▶ identity ──▶ dispatcher ──▶ resolver (cache ▸ store)
//!                               │
//!                               ├──▶ plugin registry
//!                               ├──▶ path/query allow-list
//!                               └──▶ proxy engine ──▶ datasource
//!
//!   POST /api/user/signup ──▶ event bus ──▶ user setup service
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use datasource_proxy::config::loader::load_config;
use datasource_proxy::config::watcher::ConfigWatcher;
use datasource_proxy::lifecycle::signals::trigger_on_signal;
use datasource_proxy::observability::{logging, metrics};
use datasource_proxy::{HttpServer, ProxyConfig, Shutdown};

#[derive(Parser)]
#[command(name = "datasource-proxy")]
#[command(about = "Validated reverse proxy for datasource queries", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "datasource-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        plugins = config.plugins.len(),
        datasources = config.datasources.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher must outlive the server.
    let (_watcher, config_updates) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (Some(watcher.run()?), rx)
        }
        _ => {
            let (_, rx) = mpsc::unbounded_channel();
            (None, rx)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    trigger_on_signal(shutdown);

    let server = HttpServer::new(config);
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
