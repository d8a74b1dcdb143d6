//! Command gateway worker.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!  HTTP client ─────▶│ http server ─▶ dispatcher ─▶ bridge ─▶ engine │
//!              ◀─────│   (axum)       negotiate     in/out           │
//!                    │                admission     adapters         │
//!                    │                                               │
//!  supervisor ◀─────▶│ lifecycle (heartbeats, graceful/forced stop)  │
//!  (stdin/stdout)    └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use command_gateway::config::{resolve_config, ConfigWatcher};
use command_gateway::engine::EchoEngine;
use command_gateway::http::HttpServer;
use command_gateway::lifecycle::{
    forward_signals, JsonLinesLink, LifecycleTimings, ListenerControl, LogLink, SupervisorLink,
    WorkerLifecycle,
};
use command_gateway::observability::{init_logging, init_metrics};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "command-gateway", about = "HTTP gateway for engine commands", version)]
struct Args {
    /// TOML configuration file; falls back to GATEWAY_CONFIGURATION (JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Exchange heartbeats with a supervisor over stdin/stdout.
    #[arg(long)]
    supervised: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = resolve_config(args.config.as_deref())?;
    config.lifecycle.supervised |= args.supervised;

    init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "command-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        supervised = config.lifecycle.supervised,
        neighbours = config.discovery.neighbours.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let (commands_tx, commands_rx) = mpsc::channel(16);
    let stdio_link = config
        .lifecycle
        .supervised
        .then(|| Arc::new(JsonLinesLink::stdio(commands_tx.clone())));
    let link: Arc<dyn SupervisorLink> = match &stdio_link {
        Some(link) => link.clone(),
        None => Arc::new(LogLink),
    };
    tokio::spawn(forward_signals(commands_tx));

    let (_config_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let (control, handle) = ListenerControl::new();
    let server = HttpServer::new(config.clone(), Arc::new(EchoEngine::new()));
    tokio::spawn(async move {
        if let Err(e) = server.run(listener, config_updates, handle.shutdown).await {
            tracing::error!(error = %e, "HTTP server failed");
        }
        let _ = handle.closed.send(());
    });

    let lifecycle = WorkerLifecycle::new(
        link,
        Some(control),
        config.lifecycle.supervised,
        LifecycleTimings::from(&config.lifecycle),
    );
    let state = lifecycle.run(commands_rx).await;

    if let Some(link) = stdio_link {
        link.flush().await;
    }
    tracing::info!(state = state.as_str(), "Worker exiting");

    // stdin is read on a blocking thread that runtime shutdown would wait on
    std::process::exit(0);
}
