//! A narrow, polymorphic I/O interface over one open segment file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::error::Result;

/// Default permission bits for newly created segment files.
pub const DATA_FILE_PERM: u32 = 0o644;

/// Abstracts the byte-oriented operations a [`crate::storage::Segment`] needs
/// from its backing file. The default implementation, [`FileIo`], maps these
/// directly onto OS positional I/O; the trait exists so alternative
/// backends (e.g. an in-memory file for tests, or mmap) can be swapped in
/// without touching [`crate::storage::Segment`].
pub trait IoManager: std::fmt::Debug + Send + Sync {
    /// Reads into `buf` starting at `offset`. Returns the number of bytes
    /// actually read, which is less than `buf.len()` at end-of-file.
    fn read(&self, buf: &mut [u8], offset: i64) -> Result<usize>;

    /// Appends `buf` to the file. Returns the number of bytes written.
    fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Forces all previously written bytes to stable storage.
    fn sync(&self) -> Result<()>;

    /// Returns the current physical size of the file.
    fn size(&self) -> Result<i64>;

    /// Takes an OS-level advisory exclusive lock, failing if another holder
    /// (including another process) already has it.
    fn try_lock_exclusive(&self) -> Result<()>;
}

/// The default [`IoManager`]: one append-mode file handle plus a read-only
/// handle used for positional reads, with `0644` permissions on creation.
#[derive(Debug)]
pub struct FileIo {
    write_file: File,
    read_file: File,
}

impl FileIo {
    pub fn open(path: &Path) -> Result<Self> {
        use std::os::unix::fs::OpenOptionsExt;

        let write_file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(DATA_FILE_PERM)
            .open(path)?;
        let read_file = OpenOptions::new().read(true).open(path)?;
        Ok(Self { write_file, read_file })
    }
}

impl IoManager for FileIo {
    fn read(&self, buf: &mut [u8], offset: i64) -> Result<usize> {
        if offset < 0 {
            return Ok(0);
        }
        let file_size = self.size()?;
        if offset >= file_size {
            return Ok(0);
        }
        let want = (file_size - offset).min(buf.len() as i64) as usize;
        self.read_file.read_at(&mut buf[..want], offset as u64)?;
        Ok(want)
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut file = &self.write_file;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn sync(&self) -> Result<()> {
        self.write_file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> Result<i64> {
        Ok(self.write_file.metadata()?.len() as i64)
    }

    fn try_lock_exclusive(&self) -> Result<()> {
        use fs4::FileExt;
        self.write_file.try_lock_exclusive().map_err(|_| crate::error::Error::DirectoryLocked)
    }
}
