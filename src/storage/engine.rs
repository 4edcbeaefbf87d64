//! Typed Storage Engine with Expiry Support
//!
//! This module layers Redis-style values on top of the ordered store.
//! The engine owns a fixed number of numbered databases; each database is one
//! [`OrderedStore`] keyed by string, so KEYS results always come back sorted.
//!
//! ## Design Decisions
//!
//! 1. **One lock per database**: every operation, including read-modify-write
//!    commands like INCR or LPUSH, runs inside a single critical section of the
//!    database it touches.
//! 2. **Typed values**: a key holds a string, a list or a hash. Using a key
//!    with the wrong command family is a `WRONGTYPE` error.
//! 3. **Lazy Expiry**: expired keys are purged when touched, plus background
//!    cleanup by the sweeper (see [`crate::storage::expiry`]).
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       StorageEngine                          │
//! │  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌───────────┐  │
//! │  │   db 0     │ │   db 1     │ │   db 2     │ │ ... db N  │  │
//! │  │   Mutex    │ │   Mutex    │ │   Mutex    │ │           │  │
//! │  │  SkipList  │ │  SkipList  │ │  SkipList  │ │           │  │
//! │  └────────────┘ └────────────┘ └────────────┘ └───────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::storage::pattern::GlobPattern;
use crate::storage::skiplist::{OrderedStore, SkipList};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Default number of databases, same as Redis.
pub const DEFAULT_DATABASES: usize = 16;

/// Errors raised by engine operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StorageError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("value is not an integer or out of range")]
    NotAnInteger,

    #[error("value is not a valid float")]
    NotAFloat,

    #[error("increment or decrement would overflow")]
    Overflow,

    #[error("increment would produce NaN or Infinity")]
    NonFinite,

    #[error("no such key")]
    NoSuchKey,

    #[error("invalid expire time")]
    InvalidExpireTime,

    #[error("DB index is out of range")]
    DbOutOfRange(usize),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    List(VecDeque<String>),
    Hash(BTreeMap<String, String>),
}

/// Represents a stored value with optional expiry time.
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Value,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl Entry {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(Value::String(value.into()))
    }

    /// An entry expiring `ttl` from now, or `None` if that instant is not
    /// representable.
    pub fn with_ttl(value: Value, ttl: Duration) -> Option<Self> {
        Some(Self {
            value,
            expires_at: Some(Instant::now().checked_add(ttl)?),
        })
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }
}

type Db = SkipList<String, Entry>;

/// The value layer shared by every connection.
///
/// Wrap it in an `Arc`; all methods take `&self`.
///
/// # Example
///
/// ```
/// use skipkv::storage::StorageEngine;
///
/// let engine = StorageEngine::new();
/// engine.set(0, "name".to_string(), "skip".to_string()).unwrap();
/// assert_eq!(engine.get(0, "name").unwrap(), Some("skip".to_string()));
/// assert_eq!(engine.incr_by(0, "hits", 5).unwrap(), 5);
/// ```
pub struct StorageEngine {
    databases: Vec<OrderedStore<String, Entry>>,

    /// Statistics: total read operations
    get_count: AtomicU64,
    /// Statistics: total write operations
    set_count: AtomicU64,
    /// Statistics: total delete operations
    del_count: AtomicU64,
    /// Statistics: number of expired keys removed
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("databases", &self.databases.len())
            .field("keys", &self.len())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates an engine with [`DEFAULT_DATABASES`] databases.
    pub fn new() -> Self {
        Self::with_databases(DEFAULT_DATABASES)
    }

    /// Creates an engine with `count` databases (at least one).
    pub fn with_databases(count: usize) -> Self {
        let databases = (0..count.max(1)).map(|_| OrderedStore::new()).collect();
        Self {
            databases,
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Number of numbered databases.
    pub fn databases(&self) -> usize {
        self.databases.len()
    }

    /// Checks that `db` names an existing database.
    pub fn select(&self, db: usize) -> StorageResult<()> {
        self.db(db).map(|_| ())
    }

    fn db(&self, db: usize) -> StorageResult<&OrderedStore<String, Entry>> {
        self.databases
            .get(db)
            .ok_or(StorageError::DbOutOfRange(db))
    }

    /// Removes `key` if its TTL has passed.
    fn purge_if_expired(&self, list: &mut Db, key: &str) {
        if list.get(key).is_some_and(Entry::is_expired) {
            list.remove(key);
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Live string value under `key`, `WrongType` if it holds something else.
    fn live_string<'a>(&self, list: &'a mut Db, key: &str) -> StorageResult<Option<&'a mut String>> {
        self.purge_if_expired(list, key);
        match list.get_mut(key) {
            Some(Entry {
                value: Value::String(s),
                ..
            }) => Ok(Some(s)),
            Some(_) => Err(StorageError::WrongType),
            None => Ok(None),
        }
    }

    fn live_list<'a>(
        &self,
        list: &'a mut Db,
        key: &str,
    ) -> StorageResult<Option<&'a mut VecDeque<String>>> {
        self.purge_if_expired(list, key);
        match list.get_mut(key) {
            Some(Entry {
                value: Value::List(items),
                ..
            }) => Ok(Some(items)),
            Some(_) => Err(StorageError::WrongType),
            None => Ok(None),
        }
    }

    fn live_hash<'a>(
        &self,
        list: &'a mut Db,
        key: &str,
    ) -> StorageResult<Option<&'a mut BTreeMap<String, String>>> {
        self.purge_if_expired(list, key);
        match list.get_mut(key) {
            Some(Entry {
                value: Value::Hash(fields),
                ..
            }) => Ok(Some(fields)),
            Some(_) => Err(StorageError::WrongType),
            None => Ok(None),
        }
    }

    // ========================================================================
    // KEYSPACE
    // ========================================================================

    /// Sets a string value, discarding any previous value and TTL.
    ///
    /// Returns `true` if a new key was created.
    pub fn set(&self, db: usize, key: String, value: String) -> StorageResult<bool> {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        let store = self.db(db)?;
        Ok(store.with(|list| {
            self.purge_if_expired(list, &key);
            list.upsert(key, Entry::string(value)).is_none()
        }))
    }

    /// Sets a string value only if the key does not exist.
    pub fn set_nx(&self, db: usize, key: String, value: String) -> StorageResult<bool> {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        let store = self.db(db)?;
        Ok(store.with(|list| {
            self.purge_if_expired(list, &key);
            if list.contains_key(key.as_str()) {
                false
            } else {
                list.insert(key, Entry::string(value))
            }
        }))
    }

    /// Sets a string value that expires after `ttl`.
    pub fn set_with_ttl(
        &self,
        db: usize,
        key: String,
        value: String,
        ttl: Duration,
    ) -> StorageResult<bool> {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        let store = self.db(db)?;
        let entry =
            Entry::with_ttl(Value::String(value), ttl).ok_or(StorageError::InvalidExpireTime)?;
        Ok(store.with(|list| {
            self.purge_if_expired(list, &key);
            list.upsert(key, entry).is_none()
        }))
    }

    /// Gets a string value.
    pub fn get(&self, db: usize, key: &str) -> StorageResult<Option<String>> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        self.db(db)?
            .with(|list| Ok(self.live_string(list, key)?.cloned()))
    }

    /// Sets several string values in one critical section.
    pub fn mset(&self, db: usize, pairs: Vec<(String, String)>) -> StorageResult<()> {
        self.set_count.fetch_add(pairs.len() as u64, Ordering::Relaxed);
        let store = self.db(db)?;
        store.with(|list| {
            for (key, value) in pairs {
                list.upsert(key, Entry::string(value));
            }
        });
        Ok(())
    }

    /// Gets several values; missing keys and non-strings come back as `None`.
    pub fn mget(&self, db: usize, keys: &[String]) -> StorageResult<Vec<Option<String>>> {
        self.get_count.fetch_add(keys.len() as u64, Ordering::Relaxed);
        let store = self.db(db)?;
        Ok(store.with(|list| {
            keys.iter()
                .map(|key| self.live_string(list, key).ok().flatten().cloned())
                .collect()
        }))
    }

    pub fn exists(&self, db: usize, key: &str) -> StorageResult<bool> {
        self.db(db)?.with(|list| {
            self.purge_if_expired(list, key);
            Ok(list.contains_key(key))
        })
    }

    /// Counts how many of the given keys exist. Repeated keys count twice.
    pub fn exists_many(&self, db: usize, keys: &[String]) -> StorageResult<u64> {
        self.db(db)?.with(|list| {
            Ok(keys
                .iter()
                .filter(|key| {
                    self.purge_if_expired(list, key);
                    list.contains_key(key.as_str())
                })
                .count() as u64)
        })
    }

    pub fn delete(&self, db: usize, key: &str) -> StorageResult<bool> {
        self.del_count.fetch_add(1, Ordering::Relaxed);
        self.db(db)?.with(|list| {
            self.purge_if_expired(list, key);
            Ok(list.delete(key))
        })
    }

    /// Deletes the given keys and returns how many existed.
    pub fn delete_many(&self, db: usize, keys: &[String]) -> StorageResult<u64> {
        self.del_count.fetch_add(keys.len() as u64, Ordering::Relaxed);
        self.db(db)?.with(|list| {
            Ok(keys
                .iter()
                .filter(|key| {
                    self.purge_if_expired(list, key);
                    list.delete(key.as_str())
                })
                .count() as u64)
        })
    }

    /// Moves the value (and TTL) of `from` to `to`, overwriting `to`.
    pub fn rename(&self, db: usize, from: &str, to: &str) -> StorageResult<()> {
        self.db(db)?.with(|list| {
            self.purge_if_expired(list, from);
            let entry = list.remove(from).ok_or(StorageError::NoSuchKey)?;
            list.upsert(to.to_string(), entry);
            Ok(())
        })
    }

    /// Keys matching a glob pattern, in ascending order.
    pub fn keys(&self, db: usize, pattern: &str) -> StorageResult<Vec<String>> {
        let pattern = GlobPattern::new(pattern);
        Ok(self.db(db)?.with(|list| {
            list.iter()
                .filter(|(key, entry)| {
                    !entry.is_expired() && (pattern.matches_all() || pattern.matches(key))
                })
                .map(|(key, _)| key.clone())
                .collect()
        }))
    }

    /// Number of keys in one database.
    ///
    /// Expired keys nobody has touched still count until the sweeper
    /// removes them.
    pub fn dbsize(&self, db: usize) -> StorageResult<usize> {
        Ok(self.db(db)?.size())
    }

    // ========================================================================
    // STRING OPERATIONS
    // ========================================================================

    /// Adds `delta` to an integer value; missing keys start at 0.
    /// The key's TTL, if any, is kept.
    pub fn incr_by(&self, db: usize, key: &str, delta: i64) -> StorageResult<i64> {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        self.db(db)?.with(|list| match self.live_string(list, key)? {
            Some(current) => {
                let n: i64 = current.parse().map_err(|_| StorageError::NotAnInteger)?;
                let next = n.checked_add(delta).ok_or(StorageError::Overflow)?;
                *current = next.to_string();
                Ok(next)
            }
            None => {
                list.insert(key.to_string(), Entry::string(delta.to_string()));
                Ok(delta)
            }
        })
    }

    /// Subtracts `delta` from an integer value.
    pub fn decr_by(&self, db: usize, key: &str, delta: i64) -> StorageResult<i64> {
        let negated = delta.checked_neg().ok_or(StorageError::Overflow)?;
        self.incr_by(db, key, negated)
    }

    /// Adds a floating point `delta`; missing keys start at 0.
    pub fn incr_by_float(&self, db: usize, key: &str, delta: f64) -> StorageResult<f64> {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        self.db(db)?.with(|list| match self.live_string(list, key)? {
            Some(current) => {
                let n: f64 = current.parse().map_err(|_| StorageError::NotAFloat)?;
                let next = n + delta;
                if !next.is_finite() {
                    return Err(StorageError::NonFinite);
                }
                *current = next.to_string();
                Ok(next)
            }
            None => {
                if !delta.is_finite() {
                    return Err(StorageError::NonFinite);
                }
                list.insert(key.to_string(), Entry::string(delta.to_string()));
                Ok(delta)
            }
        })
    }

    /// Appends to a string, creating it if missing. Returns the new length.
    pub fn append(&self, db: usize, key: &str, suffix: &str) -> StorageResult<usize> {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        self.db(db)?.with(|list| match self.live_string(list, key)? {
            Some(current) => {
                current.push_str(suffix);
                Ok(current.len())
            }
            None => {
                list.insert(key.to_string(), Entry::string(suffix));
                Ok(suffix.len())
            }
        })
    }

    /// Length of a string value; 0 if missing.
    pub fn strlen(&self, db: usize, key: &str) -> StorageResult<usize> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        self.db(db)?
            .with(|list| Ok(self.live_string(list, key)?.map_or(0, |s| s.len())))
    }

    // ========================================================================
    // LIST OPERATIONS
    // ========================================================================

    fn push(&self, db: usize, key: String, values: Vec<String>, front: bool) -> StorageResult<usize> {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        self.db(db)?.with(|list| {
            if let Some(items) = self.live_list(list, &key)? {
                for v in values {
                    if front {
                        items.push_front(v);
                    } else {
                        items.push_back(v);
                    }
                }
                return Ok(items.len());
            }

            let mut items = VecDeque::with_capacity(values.len());
            for v in values {
                if front {
                    items.push_front(v);
                } else {
                    items.push_back(v);
                }
            }
            let len = items.len();
            list.insert(key, Entry::new(Value::List(items)));
            Ok(len)
        })
    }

    /// Pushes values onto the head of a list, one at a time, so
    /// `LPUSH k a b c` leaves `c b a`. Returns the new length.
    pub fn lpush(&self, db: usize, key: String, values: Vec<String>) -> StorageResult<usize> {
        self.push(db, key, values, true)
    }

    /// Pushes values onto the tail of a list. Returns the new length.
    pub fn rpush(&self, db: usize, key: String, values: Vec<String>) -> StorageResult<usize> {
        self.push(db, key, values, false)
    }

    fn pop(&self, db: usize, key: &str, front: bool) -> StorageResult<Option<String>> {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        self.db(db)?.with(|list| {
            let (popped, now_empty) = match self.live_list(list, key)? {
                Some(items) => {
                    let popped = if front {
                        items.pop_front()
                    } else {
                        items.pop_back()
                    };
                    (popped, items.is_empty())
                }
                None => return Ok(None),
            };
            // Empty lists do not linger.
            if now_empty {
                list.delete(key);
            }
            Ok(popped)
        })
    }

    pub fn lpop(&self, db: usize, key: &str) -> StorageResult<Option<String>> {
        self.pop(db, key, true)
    }

    pub fn rpop(&self, db: usize, key: &str) -> StorageResult<Option<String>> {
        self.pop(db, key, false)
    }

    /// Elements between `start` and `stop`, both inclusive.
    /// Negative indices count from the end.
    pub fn lrange(&self, db: usize, key: &str, start: i64, stop: i64) -> StorageResult<Vec<String>> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        self.db(db)?.with(|list| {
            let items = match self.live_list(list, key)? {
                Some(items) => items,
                None => return Ok(Vec::new()),
            };

            let len = items.len() as i64;
            let start = if start < 0 { (len + start).max(0) } else { start };
            let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

            if start > stop || start >= len {
                return Ok(Vec::new());
            }

            Ok(items
                .iter()
                .skip(start as usize)
                .take((stop - start + 1) as usize)
                .cloned()
                .collect())
        })
    }

    // ========================================================================
    // HASH OPERATIONS
    // ========================================================================

    /// Sets hash fields. Returns how many fields were newly added.
    pub fn hset(&self, db: usize, key: String, pairs: Vec<(String, String)>) -> StorageResult<usize> {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        self.db(db)?.with(|list| {
            if let Some(fields) = self.live_hash(list, &key)? {
                return Ok(pairs
                    .into_iter()
                    .filter(|(field, value)| fields.insert(field.clone(), value.clone()).is_none())
                    .count());
            }

            let fields: BTreeMap<String, String> = pairs.into_iter().collect();
            let added = fields.len();
            list.insert(key, Entry::new(Value::Hash(fields)));
            Ok(added)
        })
    }

    pub fn hget(&self, db: usize, key: &str, field: &str) -> StorageResult<Option<String>> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        self.db(db)?.with(|list| {
            Ok(self
                .live_hash(list, key)?
                .and_then(|fields| fields.get(field).cloned()))
        })
    }

    /// Removes hash fields. Returns how many existed.
    pub fn hdel(&self, db: usize, key: &str, fields: &[String]) -> StorageResult<usize> {
        self.del_count.fetch_add(1, Ordering::Relaxed);
        self.db(db)?.with(|list| {
            let (removed, now_empty) = match self.live_hash(list, key)? {
                Some(map) => {
                    let removed = fields.iter().filter(|f| map.remove(*f).is_some()).count();
                    (removed, map.is_empty())
                }
                None => return Ok(0),
            };
            if now_empty {
                list.delete(key);
            }
            Ok(removed)
        })
    }

    /// Field names of a hash, in ascending order.
    pub fn hkeys(&self, db: usize, key: &str) -> StorageResult<Vec<String>> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        self.db(db)?.with(|list| {
            Ok(self
                .live_hash(list, key)?
                .map(|fields| fields.keys().cloned().collect())
                .unwrap_or_default())
        })
    }

    /// Field values of a hash, ordered by field name.
    pub fn hvals(&self, db: usize, key: &str) -> StorageResult<Vec<String>> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        self.db(db)?.with(|list| {
            Ok(self
                .live_hash(list, key)?
                .map(|fields| fields.values().cloned().collect())
                .unwrap_or_default())
        })
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    /// Total number of stored keys across all databases, expired or not.
    pub fn len(&self) -> u64 {
        self.databases.iter().map(|db| db.size() as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes expired keys from every database.
    ///
    /// Called by the background expiry sweeper. Returns the number removed.
    pub fn cleanup_expired(&self) -> u64 {
        let cleaned: u64 = self
            .databases
            .iter()
            .map(|db| db.with(|list| list.retain(|_, entry| !entry.is_expired())) as u64)
            .sum();

        if cleaned > 0 {
            self.expired_count.fetch_add(cleaned, Ordering::Relaxed);
        }
        cleaned
    }

    /// Shutdown boundary: purges expired keys and reports what is held.
    ///
    /// Nothing is written to disk; the summary is logged so an operator can
    /// see what the process held when it stopped.
    pub fn flush(&self) -> FlushSummary {
        let expired = self.cleanup_expired();
        let per_db: Vec<usize> = self.databases.iter().map(|db| db.size()).collect();
        let keys: usize = per_db.iter().sum();

        for (index, count) in per_db.iter().enumerate().filter(|(_, c)| **c > 0) {
            debug!(db = index, keys = count, "Database contents at flush");
        }
        info!(keys, expired, "Storage flushed");

        FlushSummary {
            databases: per_db.len(),
            keys,
            expired,
        }
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len(),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}

/// Database statistics.
#[derive(Debug, Clone, Copy)]
pub struct StorageStats {
    /// Number of keys currently stored
    pub keys: u64,
    /// Total read operations
    pub get_ops: u64,
    /// Total write operations
    pub set_ops: u64,
    /// Total delete operations
    pub del_ops: u64,
    /// Total expired keys cleaned up
    pub expired: u64,
}

/// What [`StorageEngine::flush`] found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushSummary {
    pub databases: usize,
    pub keys: usize,
    pub expired: u64,
}
