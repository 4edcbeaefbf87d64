//! Command Registry
//!
//! Hands out one shared handler per command name. A handler is built the
//! first time its name is asked for and every later lookup returns the same
//! `Arc`, so however many sessions run, each command has a single instance.

use super::hash::{HDelCommand, HGetCommand, HKeysCommand, HSetCommand, HValsCommand};
use super::keys::{DelCommand, ExistsCommand, KeysCommand, RenameCommand};
use super::list::{LPopCommand, LPushCommand, LRangeCommand, RPopCommand, RPushCommand};
use super::server::{DbSizeCommand, SelectCommand};
use super::string::{
    AppendCommand, DecrByCommand, DecrCommand, GetCommand, IncrByCommand, IncrByFloatCommand,
    IncrCommand, MGetCommand, MSetCommand, SetCommand, SetExCommand, SetNxCommand, StrLenCommand,
};
use super::CommandParser;
use crate::storage::StorageEngine;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Every command name the registry can construct.
pub const COMMANDS: &[&str] = &[
    "SELECT", "SET", "SETNX", "SETEX", "GET", "KEYS", "DBSIZE", "EXISTS", "DEL", "RENAME", "INCR",
    "INCRBY", "INCRBYFLOAT", "DECR", "DECRBY", "MSET", "MGET", "STRLEN", "APPEND", "LPUSH",
    "RPUSH", "LPOP", "RPOP", "LRANGE", "HSET", "HGET", "HDEL", "HKEYS", "HVALS",
];

/// Lazily built, shared command handlers.
#[derive(Debug)]
pub struct CommandRegistry {
    storage: Arc<StorageEngine>,
    handlers: RwLock<HashMap<String, Arc<dyn CommandParser>>>,
}

impl CommandRegistry {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self {
            storage,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// The engine every handler runs against.
    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Returns the handler for `name`, or `None` for unknown commands.
    ///
    /// Names are matched exactly; `get` is not `GET`.
    pub fn get_handler(&self, name: &str) -> Option<Arc<dyn CommandParser>> {
        if let Some(handler) = self.handlers.read().get(name) {
            return Some(Arc::clone(handler));
        }
        // Unknown names never need the write lock.
        if !COMMANDS.iter().any(|known| *known == name) {
            return None;
        }

        let mut handlers = self.handlers.write();
        // Another thread may have built it while we waited for the lock.
        if let Some(handler) = handlers.get(name) {
            return Some(Arc::clone(handler));
        }

        let handler = self.construct(name)?;
        trace!(command = name, "Handler constructed");
        handlers.insert(name.to_string(), Arc::clone(&handler));
        Some(handler)
    }

    /// Number of handlers built so far.
    pub fn cached(&self) -> usize {
        self.handlers.read().len()
    }

    fn construct(&self, name: &str) -> Option<Arc<dyn CommandParser>> {
        let storage = Arc::clone(&self.storage);
        let handler: Arc<dyn CommandParser> = match name {
            SelectCommand::NAME => Arc::new(SelectCommand::new(storage)),
            DbSizeCommand::NAME => Arc::new(DbSizeCommand::new(storage)),

            KeysCommand::NAME => Arc::new(KeysCommand::new(storage)),
            ExistsCommand::NAME => Arc::new(ExistsCommand::new(storage)),
            DelCommand::NAME => Arc::new(DelCommand::new(storage)),
            RenameCommand::NAME => Arc::new(RenameCommand::new(storage)),

            SetCommand::NAME => Arc::new(SetCommand::new(storage)),
            SetNxCommand::NAME => Arc::new(SetNxCommand::new(storage)),
            SetExCommand::NAME => Arc::new(SetExCommand::new(storage)),
            GetCommand::NAME => Arc::new(GetCommand::new(storage)),
            IncrCommand::NAME => Arc::new(IncrCommand::new(storage)),
            IncrByCommand::NAME => Arc::new(IncrByCommand::new(storage)),
            IncrByFloatCommand::NAME => Arc::new(IncrByFloatCommand::new(storage)),
            DecrCommand::NAME => Arc::new(DecrCommand::new(storage)),
            DecrByCommand::NAME => Arc::new(DecrByCommand::new(storage)),
            MSetCommand::NAME => Arc::new(MSetCommand::new(storage)),
            MGetCommand::NAME => Arc::new(MGetCommand::new(storage)),
            StrLenCommand::NAME => Arc::new(StrLenCommand::new(storage)),
            AppendCommand::NAME => Arc::new(AppendCommand::new(storage)),

            LPushCommand::NAME => Arc::new(LPushCommand::new(storage)),
            RPushCommand::NAME => Arc::new(RPushCommand::new(storage)),
            LPopCommand::NAME => Arc::new(LPopCommand::new(storage)),
            RPopCommand::NAME => Arc::new(RPopCommand::new(storage)),
            LRangeCommand::NAME => Arc::new(LRangeCommand::new(storage)),

            HSetCommand::NAME => Arc::new(HSetCommand::new(storage)),
            HGetCommand::NAME => Arc::new(HGetCommand::new(storage)),
            HDelCommand::NAME => Arc::new(HDelCommand::new(storage)),
            HKeysCommand::NAME => Arc::new(HKeysCommand::new(storage)),
            HValsCommand::NAME => Arc::new(HValsCommand::new(storage)),

            _ => return None,
        };
        Some(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn registry() -> CommandRegistry {
        CommandRegistry::new(Arc::new(StorageEngine::new()))
    }

    #[test]
    fn test_same_instance_every_time() {
        let registry = registry();
        let first = registry.get_handler("SET").unwrap();
        let second = registry.get_handler("SET").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.cached(), 1);
    }

    #[test]
    fn test_every_command_constructs() {
        let registry = registry();
        for name in COMMANDS {
            let handler = registry.get_handler(name).unwrap();
            assert_eq!(handler.name(), *name);
        }
        assert_eq!(registry.cached(), COMMANDS.len());
    }

    #[test]
    fn test_unknown_and_case_sensitive() {
        let registry = registry();
        assert!(registry.get_handler("FOO").is_none());
        assert!(registry.get_handler("get").is_none());
        assert!(registry.get_handler("").is_none());
        assert_eq!(registry.cached(), 0);
    }

    #[test]
    fn test_unknown_lookup_skips_write_lock() {
        let registry = registry();
        let set = registry.get_handler("SET").unwrap();

        // A writer would block on this guard; unknown and cached names must not.
        let _reader = registry.handlers.read();
        assert!(registry.get_handler("BOGUS").is_none());
        assert!(Arc::ptr_eq(&registry.get_handler("SET").unwrap(), &set));
    }

    #[test]
    fn test_concurrent_first_use_converges() {
        let registry = Arc::new(registry());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.get_handler("INCR").unwrap())
            })
            .collect();

        let handlers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for handler in &handlers[1..] {
            assert!(Arc::ptr_eq(&handlers[0], handler));
        }
        assert_eq!(registry.cached(), 1);
    }
}
