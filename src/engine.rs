//! The engine: owns configuration, segments, and the index, and orchestrates
//! `put`/`get`/`delete`, startup recovery, and rollover.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::index::{new_indexer, IndexIterator, Indexer, Locator, DEFAULT_TREE_FANOUT};
use crate::options::Options;
use crate::storage::{Record, Segment, DATA_FILE_SUFFIX};

/// The mutable part of engine state guarded by the single engine-level
/// reader-writer lock: the active segment and the map of sealed segments.
struct EngineState {
    active_segment: Option<Segment>,
    older_segments: HashMap<u32, Segment>,
}

/// An open Bitcask-style storage engine.
///
/// Share an `Engine` across threads behind an `Arc`. The engine lock is
/// always acquired before any index operation initiated from inside engine
/// methods, so there is no lock-order inversion between the engine lock and
/// the index's own internal lock.
pub struct Engine {
    options: Options,
    index: Box<dyn Indexer>,
    state: RwLock<EngineState>,
}

impl Engine {
    /// Opens (or creates) an engine rooted at `options.dir_path`, replaying
    /// every segment in ascending file-id order to rebuild the index.
    pub fn open(options: Options) -> Result<Self> {
        options.validate()?;
        fs::create_dir_all(&options.dir_path)?;

        let index = new_indexer(options.index_type, DEFAULT_TREE_FANOUT)?;
        let mut segments = load_data_files(&options.dir_path)?;
        let mut active_segment = segments.pop();

        let mut older_segments = HashMap::new();
        let mut records_replayed = 0usize;
        for mut segment in segments {
            records_replayed += replay_segment(&mut segment, &*index).map_err(|err| {
                log::error!("aborting recovery: segment {} failed to replay: {err}", segment.file_id);
                err
            })?;
            older_segments.insert(segment.file_id, segment);
        }
        if let Some(active) = active_segment.as_mut() {
            records_replayed += replay_segment(active, &*index).map_err(|err| {
                log::error!("aborting recovery: segment {} failed to replay: {err}", active.file_id);
                err
            })?;
            active.lock_exclusive()?;
        }

        log::info!(
            "opened bitcask engine at {:?}, replayed {} records across {} segment(s)",
            options.dir_path,
            records_replayed,
            older_segments.len() + active_segment.is_some() as usize,
        );

        Ok(Self {
            options,
            index,
            state: RwLock::new(EngineState { active_segment, older_segments }),
        })
    }

    /// Inserts or overwrites `key` with `value`. Rejects empty keys.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::KeyIsEmpty);
        }
        let record = Record::normal(key.to_vec(), value.to_vec());
        let locator = self.append_record(&record)?;
        if !self.index.put(key.to_vec(), locator) {
            return Err(Error::IndexUpdateFailed);
        }
        Ok(())
    }

    /// Looks up `key`, returning its value or `Error::KeyNotFound`.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        if key.is_empty() {
            return Err(Error::KeyIsEmpty);
        }
        let state = self.state.read().expect("engine lock poisoned");
        let locator = self.index.get(key).ok_or(Error::KeyNotFound)?;
        let record = read_at(&state, locator)?;
        if record.is_deleted() {
            return Err(Error::KeyNotFound);
        }
        Ok(record.value)
    }

    /// Removes `key`. Idempotent: deleting an absent key is a no-op that
    /// writes no tombstone.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::KeyIsEmpty);
        }
        if self.index.get(key).is_none() {
            return Ok(());
        }
        self.append_record(&Record::tombstone(key.to_vec()))?;
        if !self.index.delete(key) {
            return Err(Error::IndexUpdateFailed);
        }
        Ok(())
    }

    /// Returns a bidirectional iterator snapshot over every live key and its
    /// locator, in ascending (`reverse = false`) or descending key order.
    pub fn index_iterator(&self, reverse: bool) -> Box<dyn IndexIterator> {
        self.index.iterator(reverse)
    }

    /// All live keys in ascending order.
    pub fn list_keys(&self) -> Vec<Vec<u8>> {
        let mut it = self.index_iterator(false);
        let mut keys = Vec::new();
        it.rewind();
        while it.valid() {
            keys.push(it.key().to_vec());
            it.next();
        }
        keys
    }

    /// Flushes the active segment to stable storage. Safe to call repeatedly.
    pub fn close(&self) -> Result<()> {
        let state = self.state.read().expect("engine lock poisoned");
        if let Some(active) = state.active_segment.as_ref() {
            active.sync()?;
        }
        Ok(())
    }

    /// Appends `record` to the active segment under the engine's exclusive
    /// lock, rolling over to a fresh segment first if it wouldn't fit, and
    /// returns the locator of the appended bytes.
    fn append_record(&self, record: &Record) -> Result<Locator> {
        let (encoded, size) = record.encode();
        if size as i64 > self.options.data_file_size {
            return Err(Error::RecordTooLarge);
        }

        let mut state = self.state.write().expect("engine lock poisoned");
        if state.active_segment.is_none() {
            state.active_segment = Some(self.open_active_segment(0)?);
        }

        let needs_rollover = {
            let active = state.active_segment.as_ref().expect("ensured above");
            active.write_off + size as i64 > self.options.data_file_size
        };
        if needs_rollover {
            let sealed = state.active_segment.take().expect("just checked");
            sealed.sync()?;
            let old_id = sealed.file_id;
            let new_id = old_id + 1;
            state.older_segments.insert(old_id, sealed);
            log::warn!("rolling over segment {old_id} -> {new_id}");
            state.active_segment = Some(self.open_active_segment(new_id)?);
        }

        let active = state.active_segment.as_mut().expect("ensured above");
        let write_off = active.write_off;
        active.append(&encoded)?;
        if self.options.sync_writes {
            active.sync()?;
        }
        Ok(Locator { file_id: active.file_id, offset: write_off })
    }

    fn open_active_segment(&self, file_id: u32) -> Result<Segment> {
        let segment = Segment::open(&self.options.dir_path, file_id)?;
        segment.lock_exclusive()?;
        Ok(segment)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::error!("failed to flush active segment on drop: {err}");
        }
    }
}

fn read_at(state: &EngineState, locator: Locator) -> Result<Record> {
    let segment = match state.active_segment.as_ref() {
        Some(active) if active.file_id == locator.file_id => Some(active),
        _ => state.older_segments.get(&locator.file_id),
    };
    let segment = segment.ok_or(Error::DataFileNotFound)?;
    match segment.read_record(locator.offset)? {
        Some((record, _len)) => Ok(record),
        // The index should never reference a position with nothing there.
        None => Err(Error::DataFileNotFound),
    }
}

/// Enumerates `dir`'s `.data` files, sorted ascending by file id, and opens
/// each as a [`Segment`] with its write cursor at zero.
fn load_data_files(dir: &Path) -> Result<Vec<Segment>> {
    let mut file_ids = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.ends_with(DATA_FILE_SUFFIX) {
            continue;
        }
        let prefix = name.split('.').next().unwrap_or(&name);
        let file_id: u32 = prefix.parse().map_err(|_| Error::DataDirectoryCorrupted)?;
        file_ids.push(file_id);
    }
    file_ids.sort_unstable();

    let mut segments = Vec::with_capacity(file_ids.len());
    for file_id in file_ids {
        segments.push(Segment::open(dir, file_id)?);
    }
    Ok(segments)
}

/// Replays every record in `segment` into `index` from offset zero, leaving
/// `segment.write_off` at the offset just past the last record read. Returns
/// the number of records replayed.
fn replay_segment(segment: &mut Segment, index: &dyn Indexer) -> Result<usize> {
    let mut offset = 0i64;
    let mut count = 0usize;
    loop {
        match segment.read_record(offset)? {
            Some((record, record_len)) => {
                let locator = Locator { file_id: segment.file_id, offset };
                if record.is_deleted() {
                    index.delete(&record.key);
                } else {
                    index.put(record.key, locator);
                }
                offset += record_len;
                count += 1;
            }
            None => {
                segment.set_write_off(offset);
                return Ok(count);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexType;
    use tempfile::TempDir;
    use test_case::test_case;

    fn options_in(dir: &TempDir) -> Options {
        Options { dir_path: dir.path().to_path_buf(), ..Options::default() }
    }

    #[test]
    fn put_then_get() {
        let dir = TempDir::new().expect("tempdir");
        let engine = Engine::open(options_in(&dir)).expect("open");
        engine.put(b"a", b"1").expect("put");
        assert_eq!(engine.get(b"a").expect("get"), b"1");
    }

    #[test]
    fn get_missing_key_fails() {
        let dir = TempDir::new().expect("tempdir");
        let engine = Engine::open(options_in(&dir)).expect("open");
        assert_eq!(engine.get(b"missing"), Err(Error::KeyNotFound));
    }

    #[test_case(b"" => Err(Error::KeyIsEmpty); "empty key rejected on put")]
    fn put_rejects(key: &[u8]) -> Result<()> {
        let dir = TempDir::new().expect("tempdir");
        let engine = Engine::open(options_in(&dir)).expect("open");
        engine.put(key, b"v")
    }

    #[test]
    fn overwrite_replaces_value() {
        let dir = TempDir::new().expect("tempdir");
        let engine = Engine::open(options_in(&dir)).expect("open");
        engine.put(b"a", b"1").expect("put");
        engine.put(b"a", b"2").expect("put");
        assert_eq!(engine.get(b"a").expect("get"), b"2");
    }

    #[test]
    fn delete_then_get_fails() {
        let dir = TempDir::new().expect("tempdir");
        let engine = Engine::open(options_in(&dir)).expect("open");
        engine.put(b"a", b"1").expect("put");
        engine.delete(b"a").expect("delete");
        assert_eq!(engine.get(b"a"), Err(Error::KeyNotFound));
    }

    #[test]
    fn delete_of_missing_key_is_a_noop() {
        let dir = TempDir::new().expect("tempdir");
        let engine = Engine::open(options_in(&dir)).expect("open");
        assert_eq!(engine.delete(b"never-written"), Ok(()));
    }

    #[test]
    fn recovery_reproduces_state_across_reopen() {
        crate::test_support::init_test_logger();
        let dir = TempDir::new().expect("tempdir");
        {
            let engine = Engine::open(options_in(&dir)).expect("open");
            engine.put(b"a", b"1").expect("put");
            engine.put(b"b", b"2").expect("put");
            engine.delete(b"a").expect("delete");
            engine.close().expect("close");
        }
        let engine = Engine::open(options_in(&dir)).expect("reopen");
        assert_eq!(engine.get(b"a"), Err(Error::KeyNotFound));
        assert_eq!(engine.get(b"b").expect("get"), b"2");
        assert_eq!(engine.list_keys(), vec![b"b".to_vec()]);
    }

    #[test]
    fn oversized_record_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let mut options = options_in(&dir);
        options.data_file_size = 16;
        let engine = Engine::open(options).expect("open");
        let big_value = vec![0u8; 1024];
        assert_eq!(engine.put(b"k", &big_value), Err(Error::RecordTooLarge));
    }

    #[test]
    fn rollover_creates_new_segment_and_preserves_reads() {
        crate::test_support::init_test_logger();
        let dir = TempDir::new().expect("tempdir");
        let mut options = options_in(&dir);
        // Small enough that a handful of small records force a rollover.
        options.data_file_size = 64;
        let engine = Engine::open(options).expect("open");
        for i in 0..20u32 {
            engine.put(format!("key{i}").as_bytes(), b"value").expect("put");
        }
        for i in 0..20u32 {
            assert_eq!(engine.get(format!("key{i}").as_bytes()).expect("get"), b"value");
        }

        let data_files: Vec<_> = fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(DATA_FILE_SUFFIX))
            .collect();
        assert!(data_files.len() > 1, "expected rollover to produce multiple segment files");
    }

    #[test]
    fn iterator_reflects_deletes_and_overwrites() {
        let dir = TempDir::new().expect("tempdir");
        let engine = Engine::open(options_in(&dir)).expect("open");
        engine.put(b"c", b"3").expect("put");
        engine.put(b"a", b"1").expect("put");
        engine.put(b"b", b"2").expect("put");
        engine.delete(b"a").expect("delete");

        assert_eq!(engine.list_keys(), vec![b"b".to_vec(), b"c".to_vec()]);

        let mut reverse = engine.index_iterator(true);
        let mut keys = Vec::new();
        reverse.rewind();
        while reverse.valid() {
            keys.push(reverse.key().to_vec());
            reverse.next();
        }
        assert_eq!(keys, vec![b"c".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn second_open_on_same_directory_is_locked_out() {
        let dir = TempDir::new().expect("tempdir");
        let engine = Engine::open(options_in(&dir)).expect("open");
        engine.put(b"a", b"1").expect("put");
        let second = Engine::open(options_in(&dir));
        assert_eq!(second.err(), Some(Error::DirectoryLocked));
    }

    #[test]
    fn unsupported_index_type_is_rejected_at_open() {
        let dir = TempDir::new().expect("tempdir");
        let mut options = options_in(&dir);
        options.index_type = IndexType::AdaptiveRadix;
        assert_eq!(Engine::open(options).err(), Some(Error::UnsupportedIndexType));
    }
}
