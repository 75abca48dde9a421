//! The tree-backed [`Indexer`], wrapping a lexicographically-ordered
//! `BTreeMap<Vec<u8>, Locator>` behind a single reader-writer lock.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::index::{IndexIterator, Indexer, Locator};

/// A balanced search tree index, keyed by byte-lexicographic order.
///
/// The underlying `BTreeMap` is not itself thread-safe for concurrent
/// mutation, so every access goes through a single `RwLock`: exclusive for
/// `put`/`delete`, shared for `get` and for capturing an iterator snapshot.
#[derive(Debug)]
pub struct BTreeIndex {
    tree: RwLock<BTreeMap<Vec<u8>, Locator>>,
    #[allow(dead_code)] // recorded for parity with the reference design; see module docs
    fanout: usize,
}

impl BTreeIndex {
    pub fn new(fanout: usize) -> Self {
        Self { tree: RwLock::new(BTreeMap::new()), fanout }
    }
}

impl Indexer for BTreeIndex {
    fn put(&self, key: Vec<u8>, locator: Locator) -> bool {
        let mut tree = self.tree.write().expect("index lock poisoned");
        tree.insert(key, locator);
        true
    }

    fn get(&self, key: &[u8]) -> Option<Locator> {
        let tree = self.tree.read().expect("index lock poisoned");
        tree.get(key).copied()
    }

    fn delete(&self, key: &[u8]) -> bool {
        let mut tree = self.tree.write().expect("index lock poisoned");
        tree.remove(key).is_some()
    }

    fn iterator(&self, reverse: bool) -> Box<dyn IndexIterator> {
        let tree = self.tree.read().expect("index lock poisoned");
        let mut entries: Vec<(Vec<u8>, Locator)> =
            tree.iter().map(|(k, v)| (k.clone(), *v)).collect();
        if reverse {
            entries.reverse();
        }
        Box::new(SnapshotIterator { entries, pos: 0, reverse })
    }
}

/// A materialized, ordered snapshot of `(key, locator)` pairs, captured once
/// at construction time.
struct SnapshotIterator {
    entries: Vec<(Vec<u8>, Locator)>,
    pos: usize,
    reverse: bool,
}

impl IndexIterator for SnapshotIterator {
    fn rewind(&mut self) {
        self.pos = 0;
    }

    fn seek(&mut self, target: &[u8]) {
        // `entries` is ascending if `!reverse`, descending if `reverse`.
        // Binary search for the first element satisfying the seek
        // direction's comparison against `target`.
        self.pos = if !self.reverse {
            self.entries.partition_point(|(k, _)| k.as_slice() < target)
        } else {
            self.entries.partition_point(|(k, _)| k.as_slice() > target)
        };
    }

    fn next(&mut self) {
        if self.pos < self.entries.len() {
            self.pos += 1;
        }
    }

    fn valid(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.pos].0
    }

    fn value(&self) -> Locator {
        self.entries[self.pos].1
    }
}
