//! SkipKV server binary.
//!
//! Parses the configuration, starts the expiry sweeper and serves clients
//! until Ctrl+C, then flushes the storage engine and exits.

use clap::Parser;
use skipkv::commands::CommandRegistry;
use skipkv::connection::{handle_connection, ConnectionStats};
use skipkv::storage::{ExpirySweeper, StorageEngine};
use skipkv::Config;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
  ____  _    _       _  ____     __
 / ___|| | _(_)_ __ | |/ /\ \   / /
 \___ \| |/ / | '_ \| ' /  \ \ / /
  ___) |   <| | |_) | . \   \ V /
 |____/|_|\_\_| .__/|_|\_\   \_/
              |_|

SkipKV v{} - Ordered In-Memory Key-Value Server
────────────────────────────────────────────────
Listening on {} ({} databases)
Use Ctrl+C to shutdown gracefully.
"#,
        skipkv::VERSION,
        config.bind_address(),
        config.databases
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    print_banner(&config);
    info!(
        pid = std::process::id(),
        version = skipkv::VERSION,
        port = config.port,
        "Server starting"
    );

    let storage = Arc::new(StorageEngine::with_databases(config.databases));
    let registry = Arc::new(CommandRegistry::new(Arc::clone(&storage)));
    let stats = Arc::new(ConnectionStats::new());
    let sweeper = ExpirySweeper::start(Arc::clone(&storage), config.expiry());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), "Ready to accept connections");

    tokio::select! {
        _ = accept_loop(listener, registry, Arc::clone(&stats)) => {}
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Shutdown signal received, stopping server...");
        }
    }

    drop(sweeper);
    let summary = storage.flush();
    info!(
        keys = summary.keys,
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        requests = stats.requests_handled.load(Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    registry: Arc<CommandRegistry>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(handle_connection(
                    stream,
                    addr,
                    Arc::clone(&registry),
                    Arc::clone(&stats),
                ));
            }
            Err(e) => error!(error = %e, "Failed to accept connection"),
        }
    }
}
