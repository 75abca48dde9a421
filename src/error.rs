//! Error types for the storage engine.
//!
//! Mirrors the rest of this codebase's style: a single flat `Error` enum,
//! manual `Display`/`std::error::Error` impls, no `thiserror`/`anyhow`.

use std::fmt::{self, Display};

/// A specialized `Result` type used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the storage engine.
///
/// Every variant corresponds to a distinct, stable failure mode described in
/// the engine's external contract. None of these are retried internally: the
/// engine is fail-fast and hands every error straight back to the caller.
#[derive(Debug)]
pub enum Error {
    /// An operation was given a zero-length key.
    KeyIsEmpty,
    /// The index reported failure on `put`/`delete` despite a non-empty key.
    IndexUpdateFailed,
    /// `get` missed in the index, or resolved to a tombstone.
    KeyNotFound,
    /// A locator referenced a file id the engine doesn't hold open.
    DataFileNotFound,
    /// `Options::dir_path` was empty.
    DirPathEmpty,
    /// `Options::data_file_size` was <= 0.
    DataFileSizeInvalid,
    /// A `.data` file name did not parse as a decimal file id.
    DataDirectoryCorrupted,
    /// A record's checksum did not match its stored crc.
    InvalidCrc,
    /// An encoded record is larger than `Options::data_file_size` and can
    /// never be appended, even to a freshly rolled, empty segment.
    RecordTooLarge,
    /// The advisory lock on the data directory is held by another engine.
    DirectoryLocked,
    /// The configured `IndexType` tag is not a recognized backend.
    UnsupportedIndexType,
    /// Wraps an underlying I/O failure.
    Io(std::io::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::KeyIsEmpty => write!(f, "key is empty"),
            Error::IndexUpdateFailed => write!(f, "index update failed"),
            Error::KeyNotFound => write!(f, "key is not found"),
            Error::DataFileNotFound => write!(f, "data file is not found"),
            Error::DirPathEmpty => write!(f, "dir path is empty"),
            Error::DataFileSizeInvalid => write!(f, "file size is less than 0"),
            Error::DataDirectoryCorrupted => write!(f, "data directory maybe corrupted"),
            Error::InvalidCrc => write!(f, "invalid crc"),
            Error::RecordTooLarge => write!(f, "record exceeds configured data file size"),
            Error::DirectoryLocked => write!(f, "another process holds the data directory lock"),
            Error::UnsupportedIndexType => write!(f, "unsupported index type"),
            Error::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        // Io wraps a foreign, non-comparable error; compare by discriminant
        // via Display so tests can still assert on error *kind*.
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}
