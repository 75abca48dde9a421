//! A single append-only segment file, plus its write cursor.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::storage::io::{FileIo, IoManager};
use crate::storage::record::{decode_header, record_type_from_byte, verify_crc, Record, MAX_HEADER_SIZE};

/// Suffix every segment file carries.
pub const DATA_FILE_SUFFIX: &str = ".data";

/// Formats the on-disk file name for a given file id: `NNNNNNNNN.data`.
pub fn segment_file_name(file_id: u32) -> String {
    format!("{file_id:09}{DATA_FILE_SUFFIX}")
}

/// One append-only data file plus its write cursor.
///
/// A segment is either the single active (writable) segment, or one of the
/// immutable, sealed `older_segments`. Once sealed, a segment is never
/// written to again.
#[derive(Debug)]
pub struct Segment {
    pub file_id: u32,
    pub write_off: i64,
    path: PathBuf,
    io: Box<dyn IoManager>,
}

impl Segment {
    /// Opens (or creates) the segment file for `file_id` inside `dir`.
    /// `write_off` starts at zero; callers recovering from disk set it
    /// explicitly via [`Segment::set_write_off`] once scanning is complete.
    pub fn open(dir: &Path, file_id: u32) -> Result<Self> {
        let path = dir.join(segment_file_name(file_id));
        let io = Box::new(FileIo::open(&path)?);
        Ok(Self { file_id, write_off: 0, path, io })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_write_off(&mut self, write_off: i64) {
        self.write_off = write_off;
    }

    /// Takes an OS-level advisory exclusive lock on this segment's file,
    /// failing if another process (or engine instance) already holds it.
    pub fn lock_exclusive(&self) -> Result<()> {
        self.io.try_lock_exclusive()
    }

    /// Appends an already-encoded record buffer. `write_off` only advances
    /// by the number of bytes the I/O manager actually reports writing.
    pub fn append(&mut self, encoded: &[u8]) -> Result<()> {
        let n = self.io.write(encoded)?;
        self.write_off += n as i64;
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.io.sync()
    }

    /// Reads and decodes the record starting at `at_offset`.
    ///
    /// Returns `Ok(None)` at end-of-segment (short header, or the all-zero
    /// sentinel header), `Err(Error::InvalidCrc)` on checksum mismatch, and
    /// `Ok(Some((record, record_len)))` otherwise.
    pub fn read_record(&self, at_offset: i64) -> Result<Option<(Record, i64)>> {
        let size = self.io.size()?;
        if at_offset >= size {
            return Ok(None);
        }

        let header_budget = (MAX_HEADER_SIZE as i64).min(size - at_offset) as usize;
        let mut header_buf = vec![0u8; header_budget];
        let n = self.io.read(&mut header_buf, at_offset)?;
        header_buf.truncate(n);

        let (header, header_len) = match decode_header(&header_buf) {
            Some(parsed) => parsed,
            None => {
                log::debug!("segment {}: short header at offset {at_offset}, stopping replay", self.file_id);
                return Ok(None);
            }
        };
        if header.is_sentinel() {
            return Ok(None);
        }

        let kv_len = header.key_size + header.value_size;
        let mut kv_buf = vec![0u8; kv_len];
        if kv_len > 0 {
            let n = self.io.read(&mut kv_buf, at_offset + header_len as i64)?;
            if n < kv_len {
                // The file ends mid-record: a torn write. The crc check
                // below would fail anyway, but a short read can't even be
                // sliced into key/value, so report the corruption directly.
                return Err(Error::InvalidCrc);
            }
        }

        let key = kv_buf[..header.key_size].to_vec();
        let value = kv_buf[header.key_size..].to_vec();
        verify_crc(header.crc, &header_buf[4..header_len], &key, &value)?;

        let record_type = record_type_from_byte(header.record_type_byte);
        let record = Record { key, value, record_type };
        let record_len = header_len as i64 + kv_len as i64;
        Ok(Some((record, record_len)))
    }
}
