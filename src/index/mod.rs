//! The in-memory index: an ordered key → locator map behind a polymorphic
//! interface, with a bidirectional, snapshot-style iterator.

mod btree;

pub use btree::BTreeIndex;

use crate::error::{Error, Result};

/// Default internal fan-out recorded for the tree backend. The backend
/// wraps `std::collections::BTreeMap`, which does not expose node-degree
/// tuning, so this value is accepted and stored for parity with the
/// reference design rather than actually steering node sizing.
pub const DEFAULT_TREE_FANOUT: usize = 32;

/// A `(file_id, offset)` pair addressing the first byte of an encoded
/// record's crc field inside the segment whose file id matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator {
    pub file_id: u32,
    pub offset: i64,
}

/// Selects an index backend at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// A balanced, comparison-ordered search tree (the only backend designed
    /// in detail; tag `1`).
    Tree,
    /// Reserved for a future adaptive-radix-tree backend (tag `2`).
    AdaptiveRadix,
}

/// The capability set every index backend must provide.
///
/// `put`/`delete` report only whether the *structural* operation succeeded;
/// overwriting an existing key via `put` is allowed and still returns
/// `true`. Implementations are expected to be safe for any number of
/// concurrent readers alongside a single writer.
pub trait Indexer: std::fmt::Debug + Send + Sync {
    fn put(&self, key: Vec<u8>, locator: Locator) -> bool;
    fn get(&self, key: &[u8]) -> Option<Locator>;
    fn delete(&self, key: &[u8]) -> bool;
    fn iterator(&self, reverse: bool) -> Box<dyn IndexIterator>;
}

/// A bidirectional, snapshot-style iterator over `(key, locator)` pairs.
///
/// The iterator materializes an ordered snapshot at construction time, so
/// it is unaffected by index mutations made after it was created and never
/// holds the index's internal lock while the caller drives iteration.
pub trait IndexIterator {
    /// Resets the cursor to the first element of the captured order.
    fn rewind(&mut self);
    /// Advances to the first element whose key is `>= target` (ascending)
    /// or `<= target` (descending), using binary search.
    fn seek(&mut self, target: &[u8]);
    /// Advances the cursor by one position.
    fn next(&mut self);
    /// True iff the cursor currently addresses an element.
    fn valid(&self) -> bool;
    /// The key at the current position. Unspecified if `!valid()`.
    fn key(&self) -> &[u8];
    /// The locator at the current position. Unspecified if `!valid()`.
    fn value(&self) -> Locator;
}

/// Constructs an index backend for the given tag and fan-out.
pub fn new_indexer(index_type: IndexType, fanout: usize) -> Result<Box<dyn Indexer>> {
    match index_type {
        IndexType::Tree => Ok(Box::new(BTreeIndex::new(fanout))),
        IndexType::AdaptiveRadix => Err(Error::UnsupportedIndexType),
    }
}
