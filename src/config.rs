//! Server configuration, parsed from the command line.

use crate::storage::{ExpiryConfig, DEFAULT_DATABASES};
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use clap::Parser;
use std::time::Duration;

/// SkipKV server
#[derive(Parser, Debug, Clone)]
#[command(name = "skipkv")]
#[command(about = "Ordered in-memory key-value server with MULTI/EXEC transactions")]
#[command(version)]
pub struct Config {
    /// Host to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Number of databases reachable with SELECT
    #[arg(long, default_value_t = DEFAULT_DATABASES)]
    pub databases: usize,

    /// Log filter used when RUST_LOG is unset (e.g. "info", "skipkv=debug")
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Starting interval of the background expiry sweep, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub sweep_interval_ms: u64,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn expiry(&self) -> ExpiryConfig {
        ExpiryConfig::with_base_interval(Duration::from_millis(self.sweep_interval_ms.max(1)))
    }
}
