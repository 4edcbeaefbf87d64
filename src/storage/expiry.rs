//! Background Expiry Sweeper
//!
//! Keys written with SETEX are removed lazily when a command touches them.
//! A key that is never touched again would sit in its skip list forever, so
//! this task periodically walks every database and drops whatever has expired.
//!
//! The interval adapts: when a sweep finds a large share of expired keys the
//! next one comes sooner, and an idle sweep backs off towards `max_interval`.

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval used for the first sweep
    pub base_interval: Duration,

    /// Lower bound when speeding up
    pub min_interval: Duration,

    /// Upper bound when backing off
    pub max_interval: Duration,

    /// Expired share of scanned keys above which sweeping speeds up
    pub speedup_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
        }
    }
}

impl ExpiryConfig {
    /// Default bounds around a custom starting interval.
    pub fn with_base_interval(base_interval: Duration) -> Self {
        let defaults = Self::default();
        Self {
            base_interval,
            min_interval: defaults.min_interval.min(base_interval),
            max_interval: defaults.max_interval.max(base_interval),
            ..defaults
        }
    }

    /// Interval for the sweep after one that removed `expired` of `scanned` keys.
    fn next_interval(&self, current: Duration, expired: u64, scanned: u64) -> Duration {
        if scanned == 0 || expired == 0 {
            return (current * 2).min(self.max_interval);
        }
        let rate = expired as f64 / scanned as f64;
        if rate > self.speedup_threshold {
            (current / 2).max(self.min_interval)
        } else {
            current
        }
    }
}

/// Handle to the running sweeper. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper on the current Tokio runtime.
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            interval_ms = config.base_interval.as_millis() as u64,
            "Background expiry sweeper started"
        );
        tokio::spawn(sweeper_loop(engine, config, shutdown_rx));

        Self { shutdown_tx }
    }

    pub fn stop(&self) {
        if self.shutdown_tx.send(true).is_ok() {
            info!("Background expiry sweeper stopped");
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let scanned = engine.len();
        let expired = engine.cleanup_expired();
        interval = config.next_interval(interval, expired, scanned);

        if expired > 0 {
            debug!(
                expired,
                keys_remaining = engine.len(),
                next_ms = interval.as_millis() as u64,
                "Expired keys cleaned up"
            );
        } else {
            trace!(next_ms = interval.as_millis() as u64, "Nothing expired");
        }
    }
}

/// Starts the sweeper with [`ExpiryConfig::default`].
pub fn start_expiry_sweeper(engine: Arc<StorageEngine>) -> ExpirySweeper {
    ExpirySweeper::start(engine, ExpiryConfig::default())
}
