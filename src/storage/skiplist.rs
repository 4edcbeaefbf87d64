//! Concurrent Ordered Store
//!
//! A skip list keeps every database's keys in sorted order. Each node is
//! promoted to the next level with probability 1/4, which gives an expected
//! height of O(log n) and O(log n) expected search, insert and delete.
//!
//! ## Layout
//!
//! ```text
//! level 3: head ───────────────────────────────> [m] ───────────────> nil
//! level 2: head ──────────> [d] ───────────────> [m] ───────────────> nil
//! level 1: head ──> [b] ──> [d] ──────> [h] ───> [m] ──────> [t] ───> nil
//! level 0: head ──> [b] ──> [d] ──> [f] [h] ───> [m] ──> [p] [t] ───> nil
//! ```
//!
//! Nodes live in an arena (`Vec<Option<Node>>`) and link to each other by
//! index. Freed slots are pushed onto a free list and reused by later inserts,
//! so there is no shared ownership and no reference cycle to break.
//!
//! ## Concurrency
//!
//! [`SkipList`] itself is a plain single-threaded structure. [`OrderedStore`]
//! wraps it in one exclusive lock: every operation holds the lock for the
//! whole call, so structural mutations never interleave. Compound operations
//! (read-modify-write) go through [`OrderedStore::with`] to stay inside a
//! single critical section.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::borrow::Borrow;
use std::fmt;

/// Maximum height of any node.
pub const MAX_LEVEL: usize = 32;

/// Probability that a node is promoted to the next level.
pub const PROMOTION_PROBABILITY: f64 = 0.25;

/// A successor link: the arena index of the next node, or `None` at the end.
type Link = Option<usize>;

/// Position a traversal is standing on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// The sentinel in front of the first node. It never carries a key.
    Head,
    /// A live node in the arena.
    Node(usize),
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    /// One successor per level this node participates in.
    forward: Vec<Link>,
}

/// An ordered map backed by a skip list.
///
/// `insert` does not check for an existing key: inserting the same key twice
/// links two nodes. Callers that need upsert semantics use [`SkipList::upsert`],
/// [`SkipList::modify`], or look the key up first.
pub struct SkipList<K, V> {
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    head: [Link; MAX_LEVEL],
    level: usize,
    len: usize,
    rng: StdRng,
}

impl<K, V> fmt::Debug for SkipList<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkipList")
            .field("len", &self.len)
            .field("level", &self.level)
            .field("arena_slots", &self.nodes.len())
            .field("free_slots", &self.free.len())
            .finish()
    }
}

impl<K: Ord, V> Default for SkipList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> SkipList<K, V> {
    /// Creates an empty skip list with an entropy-seeded level generator.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates an empty skip list whose level assignment is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: [None; MAX_LEVEL],
            level: 0,
            len: 0,
            rng,
        }
    }

    /// Number of nodes reachable at level 0.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The tallest level currently in use (0 when empty).
    pub fn level(&self) -> usize {
        self.level
    }

    /// Links a new node for `key`. Always returns `true`.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let mut update = self.predecessors(&key);

        let new_level = self.random_level();
        if new_level > self.level {
            for slot in update.iter_mut().take(new_level).skip(self.level) {
                *slot = Cursor::Head;
            }
            self.level = new_level;
        }

        let forward = (0..new_level)
            .map(|lvl| self.forward(update[lvl], lvl))
            .collect();
        let id = self.alloc(Node {
            key,
            value,
            forward,
        });

        for (lvl, pred) in update.iter().enumerate().take(new_level) {
            self.set_forward(*pred, lvl, Some(id));
        }

        self.len += 1;
        true
    }

    /// Returns the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let id = self.find(key)?;
        self.node(id).map(|n| &n.value)
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let id = self.find(key)?;
        match self.nodes.get_mut(id) {
            Some(Some(node)) => Some(&mut node.value),
            _ => None,
        }
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find(key).is_some()
    }

    /// Overwrites the value of an existing key. Returns `false` if absent.
    pub fn modify<Q>(&mut self, key: &Q, value: V) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.get_mut(key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Inserts `value` or replaces the existing one, returning the old value.
    pub fn upsert(&mut self, key: K, value: V) -> Option<V> {
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.insert(key, value);
                None
            }
        }
    }

    /// Unlinks `key` from every level it occupies and returns its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let update = self.predecessors(key);
        let target = self.forward(update[0], 0)?;
        match self.node(target) {
            Some(node) if node.key.borrow() == key => {}
            _ => return None,
        }

        for (lvl, pred) in update.iter().enumerate().take(self.level) {
            if self.forward(*pred, lvl) != Some(target) {
                break;
            }
            let next = self.forward(Cursor::Node(target), lvl);
            self.set_forward(*pred, lvl, next);
        }

        let node = self.nodes.get_mut(target).and_then(Option::take)?;
        self.free.push(target);

        while self.level > 0 && self.head[self.level - 1].is_none() {
            self.level -= 1;
        }
        self.len -= 1;
        Some(node.value)
    }

    /// Unlinks `key`. Returns `false` if it was absent.
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.remove(key).is_some()
    }

    /// Iterates level 0 in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            list: self,
            next: self.head[0],
        }
    }

    /// Removes every entry and releases the arena.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.head = [None; MAX_LEVEL];
        self.level = 0;
        self.len = 0;
    }

    /// Removes every entry for which `pred` returns `false`.
    /// Returns the number of removed entries.
    pub fn retain<F>(&mut self, mut pred: F) -> usize
    where
        K: Clone,
        F: FnMut(&K, &V) -> bool,
    {
        let doomed: Vec<K> = self
            .iter()
            .filter(|&(k, v)| !pred(k, v))
            .map(|(k, _)| k.clone())
            .collect();
        doomed.iter().filter(|k| self.delete(*k)).count()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Walks from the top level down, recording the last node before `key`
    /// on each level. These are the splice points for insert and remove.
    fn predecessors<Q>(&self, key: &Q) -> [Cursor; MAX_LEVEL]
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut update = [Cursor::Head; MAX_LEVEL];
        let mut cur = Cursor::Head;
        for lvl in (0..self.level).rev() {
            while let Some(next) = self.forward(cur, lvl) {
                match self.node(next) {
                    Some(node) if node.key.borrow() < key => cur = Cursor::Node(next),
                    _ => break,
                }
            }
            update[lvl] = cur;
        }
        update
    }

    fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let update = self.predecessors(key);
        let candidate = self.forward(update[0], 0)?;
        match self.node(candidate) {
            Some(node) if node.key.borrow() == key => Some(candidate),
            _ => None,
        }
    }

    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < MAX_LEVEL && self.rng.gen_bool(PROMOTION_PROBABILITY) {
            level += 1;
        }
        level
    }

    fn alloc(&mut self, node: Node<K, V>) -> usize {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    #[inline]
    fn node(&self, id: usize) -> Option<&Node<K, V>> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    #[inline]
    fn forward(&self, at: Cursor, lvl: usize) -> Link {
        match at {
            Cursor::Head => self.head[lvl],
            Cursor::Node(id) => self
                .node(id)
                .and_then(|n| n.forward.get(lvl).copied())
                .flatten(),
        }
    }

    fn set_forward(&mut self, at: Cursor, lvl: usize, link: Link) {
        match at {
            Cursor::Head => self.head[lvl] = link,
            Cursor::Node(id) => {
                if let Some(Some(node)) = self.nodes.get_mut(id) {
                    if let Some(slot) = node.forward.get_mut(lvl) {
                        *slot = link;
                    }
                }
            }
        }
    }
}

/// Ascending iterator over a [`SkipList`].
pub struct Iter<'a, K, V> {
    list: &'a SkipList<K, V>,
    next: Link,
}

impl<'a, K: Ord, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = self.list.node(id)?;
        self.next = node.forward.first().copied().flatten();
        Some((&node.key, &node.value))
    }
}

/// A [`SkipList`] behind a single exclusive lock.
///
/// This is what the storage engine keeps per database and what gets shared
/// across connection tasks.
pub struct OrderedStore<K, V> {
    inner: Mutex<SkipList<K, V>>,
}

impl<K, V> fmt::Debug for OrderedStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OrderedStore").field(&*self.inner.lock()).finish()
    }
}

impl<K: Ord, V> Default for OrderedStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> OrderedStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SkipList::new()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            inner: Mutex::new(SkipList::with_seed(seed)),
        }
    }

    /// Links a new node without checking for an existing key.
    pub fn insert(&self, key: K, value: V) -> bool {
        self.inner.lock().insert(key, value)
    }

    /// Returns a copy of the value stored under `key`.
    pub fn search<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
        V: Clone,
    {
        self.inner.lock().get(key).cloned()
    }

    /// Overwrites an existing value. The lookup and the write share one
    /// critical section, so the key cannot vanish in between.
    pub fn modify<Q>(&self, key: &Q, value: V) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.inner.lock().modify(key, value)
    }

    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.inner.lock().delete(key)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn upsert(&self, key: K, value: V) -> Option<V> {
        self.inner.lock().upsert(key, value)
    }

    /// Runs `f` against the skip list while holding the lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut SkipList<K, V>) -> R) -> R {
        f(&mut *self.inner.lock())
    }

    /// Snapshot of all keys in ascending order.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.inner.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Snapshot of all entries in ascending key order.
    pub fn entries(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.inner
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn level(&self) -> usize {
        self.inner.lock().level()
    }
}
