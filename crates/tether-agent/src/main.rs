//! # tether
//!
//! Server binary: loads settings, initialises logging and metrics, registers
//! the built-in tools and serves the SSE transport until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tether_core::{LogFormat, ToolCatalog};
use tether_server::config::ServerConfig;
use tether_server::rpc::ToolRpcHandler;
use tether_server::server::TetherServer;
use tether_settings::TetherSettings;
use tether_tools::{ToolRegistry, register_builtins};

/// How long in-flight requests get to finish after ctrl-c.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Remote tool invocation over Server-Sent Events.
#[derive(Parser, Debug)]
#[command(name = "tether", version, about = "SSE tool server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.tether/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level or `EnvFilter` directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Log line format: `compact` or `json` (overrides settings).
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Apply flags on top of loaded settings.
    fn apply(&self, settings: &mut TetherSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format;
        }
    }
}

fn load(cli: &Cli) -> Result<TetherSettings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(tether_settings::settings_path);
    let mut settings = tether_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    Ok(settings)
}

fn build_server(settings: &TetherSettings) -> TetherServer {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry);
    let tool_count = registry.len();

    let config = ServerConfig::from_settings(settings);
    let catalog: Arc<dyn ToolCatalog> = Arc::new(registry);
    let handler = Arc::new(ToolRpcHandler::new(
        Arc::clone(&catalog),
        config.name.clone(),
        config.version.clone(),
    ));
    tracing::debug!(tool_count, "tool catalog ready");
    TetherServer::new(config, catalog, handler)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;

    tether_core::init_subscriber(&settings.logging.level, settings.logging.format);

    let mut server = build_server(&settings);
    match tether_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder not installed"),
    }

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        "tether listening on http://{addr}{} (messages at {})",
        server.config().stream_path,
        server.config().message_path
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let closed = server.initiate_shutdown();
    let outcome = server
        .shutdown()
        .drain(vec![handle], SHUTDOWN_GRACE)
        .await;

    tracing::info!(closed, ?outcome, "Shutdown complete");
    Ok(())
}
