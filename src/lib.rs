//! # SkipKV - An Ordered In-Memory Key-Value Server
//!
//! SkipKV speaks a small, line-based subset of a familiar in-memory database's
//! command language. Each database is an ordered map backed by a skip list,
//! so `KEYS` always comes back sorted, and clients can batch commands with
//! `multi` / `exec` / `discard`.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                              SkipKV                                │
//! │                                                                    │
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────┐   ┌───────────┐  │
//! │  │ TCP Server  │──>│ Connection  │──>│ Session  │──>│ Command   │  │
//! │  │ (Listener)  │   │  Handler    │   │ (MULTI)  │   │ Registry  │  │
//! │  └─────────────┘   └─────────────┘   └──────────┘   └─────┬─────┘  │
//! │                                                           │        │
//! │                                                           ▼        │
//! │          ┌──────────────────────────────────────────────────────┐  │
//! │          │                   StorageEngine                      │  │
//! │          │  ┌──────────┐ ┌──────────┐ ┌──────────┐              │  │
//! │          │  │  db 0    │ │  db 1    │ │  db 2    │   ...        │  │
//! │          │  │SkipList  │ │SkipList  │ │SkipList  │              │  │
//! │          │  └──────────┘ └──────────┘ └──────────┘              │  │
//! │          └──────────────────────────────────────────────────────┘  │
//! │                                 ▲                                  │
//! │                       ┌─────────┴─────────┐                        │
//! │                       │   ExpirySweeper   │                        │
//! │                       └───────────────────┘                        │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use skipkv::commands::CommandRegistry;
//! use skipkv::session::Session;
//! use skipkv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new());
//! let registry = Arc::new(CommandRegistry::new(storage));
//! let mut session = Session::new(registry);
//!
//! assert_eq!(session.handle("multi").to_string(), "OK");
//! assert_eq!(session.handle("SET a 1").to_string(), "QUEUED");
//! assert_eq!(session.handle("INCR a").to_string(), "QUEUED");
//! assert_eq!(session.handle("exec").to_string(), "1) OK\n2) (integer) 2");
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: skip list, typed value engine, TTL sweeper
//! - [`commands`]: one handler per command, shared through the registry
//! - [`session`]: per-client transaction state machine
//! - [`protocol`]: line framing and reply rendering
//! - [`connection`]: per-client TCP loop
//! - [`config`]: command-line configuration
//!
//! ## Expiry
//!
//! Keys set with `SETEX` expire two ways:
//! 1. **Lazy**: any command touching an expired key removes it first
//! 2. **Active**: a background task sweeps every database on an adaptive interval

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod session;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandContext, CommandError, CommandParser, CommandRegistry};
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::Reply;
pub use session::Session;
pub use storage::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, OrderedStore, StorageEngine};

/// The default port SkipKV listens on
pub const DEFAULT_PORT: u16 = 5555;

/// The default host SkipKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of SkipKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
