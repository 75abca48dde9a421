//! User-facing options for opening an [`crate::engine::Engine`].

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::index::IndexType;

/// Default rollover threshold: 256 MiB.
pub const DEFAULT_DATA_FILE_SIZE: i64 = 256 * 1024 * 1024;

/// Options controlling where and how an [`crate::engine::Engine`] stores its data.
///
/// `Options` is part of the engine's core surface (it is handed directly to
/// `Engine::open`); loading these values from an external config file (TOML,
/// YAML, environment) is a separate, out-of-scope concern left to callers.
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory holding segment files. Required, non-empty; created if absent.
    pub dir_path: PathBuf,
    /// Rollover threshold in bytes. Must be > 0.
    pub data_file_size: i64,
    /// If true, fsync the active segment after every successful append.
    pub sync_writes: bool,
    /// Index backend tag: `IndexType::Tree` (1) or `IndexType::AdaptiveRadix` (2, reserved).
    pub index_type: IndexType,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dir_path: std::env::temp_dir(),
            data_file_size: DEFAULT_DATA_FILE_SIZE,
            sync_writes: false,
            index_type: IndexType::Tree,
        }
    }
}

impl Options {
    /// Validates the options, returning the corresponding error on failure.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.dir_path.as_os_str().is_empty() {
            return Err(Error::DirPathEmpty);
        }
        if self.data_file_size <= 0 {
            return Err(Error::DataFileSizeInvalid);
        }
        Ok(())
    }
}
