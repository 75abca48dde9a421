#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
#![allow(clippy::too_long_first_doc_paragraph)]

//! An embedded, append-only log-structured key-value storage engine.
//!
//! Writes are appended to a segment file on disk; an in-memory index maps
//! each key to the segment and offset of its most recent write. Segments
//! roll over once they reach a configured size, and startup replays every
//! segment in order to rebuild the index from scratch.

pub mod engine;
pub mod error;
pub mod index;
pub mod options;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use engine::Engine;
pub use error::{Error, Result};
pub use index::{IndexIterator, IndexType, Locator};
pub use options::Options;
