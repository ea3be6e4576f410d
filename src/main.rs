//! Network Monitor for Zentinel
//!
//! Serves TCP connection counts and known-bot traffic statistics over HTTP.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zentinel_network_monitor::{server, Catalog, NetworkMonitor, NetworkMonitorConfig};

#[derive(Parser, Debug)]
#[command(name = "zentinel-network-monitor")]
#[command(author, version, about = "TCP connection and bot traffic monitor for Zentinel")]
struct Args {
    /// Path to configuration file (JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the vendor pattern catalog (JSON)
    #[arg(long, default_value = "data/vendors.json")]
    vendors: PathBuf,

    /// Listen address, overrides the configuration file
    #[arg(short, long)]
    listen: Option<String>,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(json: bool, level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let env_filter = EnvFilter::from_default_env()
        .add_directive(level.into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<NetworkMonitorConfig> {
    let Some(path) = path else {
        return Ok(NetworkMonitorConfig::default());
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = if path.extension().is_some_and(|e| e == "yaml" || e == "yml") {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };

    Ok(config)
}

fn load_catalog(path: &Path) -> Result<Catalog> {
    if path.exists() {
        Ok(Catalog::from_file(path)?)
    } else {
        warn!(path = %path.display(), "Vendor catalog not found, using built-in catalog");
        Ok(Catalog::builtin())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(args.json_logs, &args.log_level);

    let mut config = load_config(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    let catalog = load_catalog(&args.vendors)?;

    info!(
        listen = %config.server.listen,
        debug = config.debug,
        api_key = config.auth.api_key.is_some(),
        allowed_networks = config.auth.allowed_networks.len(),
        "Starting network monitor"
    );

    let listen = config.server.listen.clone();
    let monitor = Arc::new(NetworkMonitor::new(config, catalog));

    server::serve(monitor, &listen).await
}
