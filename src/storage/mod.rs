//! Storage Module
//!
//! Everything below the command layer: the concurrent skip list, the typed
//! value engine that keeps one skip list per database, and the background
//! sweeper that removes expired keys.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │   strings / lists / hashes, TTLs, SELECT-able databases     │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────┐            │
//! │  │OrderedStore │ │OrderedStore │ │OrderedStore │  ...       │
//! │  │ (skip list) │ │ (skip list) │ │ (skip list) │            │
//! │  └─────────────┘ └─────────────┘ └─────────────┘            │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use skipkv::storage::OrderedStore;
//!
//! let store = OrderedStore::new();
//! store.insert("b".to_string(), 2);
//! store.insert("a".to_string(), 1);
//!
//! assert_eq!(store.search("a"), Some(1));
//! assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);
//! assert!(store.delete("a"));
//! assert_eq!(store.size(), 1);
//! ```

pub mod engine;
pub mod expiry;
pub mod pattern;
pub mod skiplist;

// Re-export commonly used types
pub use engine::{
    Entry, FlushSummary, StorageEngine, StorageError, StorageResult, StorageStats, Value,
    DEFAULT_DATABASES,
};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
pub use pattern::GlobPattern;
pub use skiplist::{OrderedStore, SkipList, MAX_LEVEL};
