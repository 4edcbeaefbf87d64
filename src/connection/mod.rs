//! Connection Module
//!
//! Every accepted TCP connection gets its own task and its own [`Session`],
//! so transaction state and the selected database never leak between
//! clients. The [`CommandRegistry`] and the storage behind it are shared.
//!
//! ```text
//!   TcpListener (main.rs)
//!          │ accept()
//!          ▼
//!   tokio::spawn(handle_connection)
//!          │
//!          ▼
//!   ┌──────────────────────────────────────────────┐
//!   │ ConnectionHandler                            │
//!   │   read bytes ─> parse_line ─> Session::handle│
//!   │        ▲                            │        │
//!   │        └──────── write reply + \n <─┘        │
//!   └──────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use skipkv::commands::CommandRegistry;
//! use skipkv::connection::{handle_connection, ConnectionStats};
//! use skipkv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(CommandRegistry::new(Arc::new(StorageEngine::new())));
//! let stats = Arc::new(ConnectionStats::new());
//!
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, Arc::clone(&registry), Arc::clone(&stats)));
//! ```
//!
//! [`Session`]: crate::session::Session
//! [`CommandRegistry`]: crate::commands::CommandRegistry

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
