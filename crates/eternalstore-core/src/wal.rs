//! Write-Ahead Log
//!
//! The WAL is the durable copy of the store. Writes follow a strict order:
//! 1. Serialize every op of the batch, then the `Commit` marker
//! 2. Append the whole buffer to the current WAL file
//! 3. Durable sync (unless the engine runs relaxed)
//! 4. Return; only then does the caller touch RAM
//!
//! A batch never spans two WAL files. Recovery applies a batch only when its
//! commit marker is present and its entry count matches.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::batch::{BatchOp, WriteBatch};
use crate::checkpoint::{sync_dir, write_snapshot, CheckpointResult};
use crate::error::{EngineError, EngineResult};
use crate::format::{
    deserialize_entry, entry_len, serialize_commit, serialize_into, Operation, HEADER_SIZE,
    MAGIC_ARRAY,
};
use crate::platform_durability::durable_sync;

const WAL_PREFIX: &str = "wal-";
const WAL_SUFFIX: &str = ".etrn";

fn wal_file_name(sequence: u64) -> String {
    format!("{}{:016x}{}", WAL_PREFIX, sequence, WAL_SUFFIX)
}

fn parse_sequence(name: &str) -> Option<u64> {
    let hex = name.strip_prefix(WAL_PREFIX)?.strip_suffix(WAL_SUFFIX)?;
    u64::from_str_radix(hex, 16).ok()
}

/// WAL files in `wal_dir`, sorted by sequence.
fn list_wal_files(wal_dir: &Path) -> EngineResult<Vec<(u64, PathBuf)>> {
    let dir_entries = std::fs::read_dir(wal_dir)
        .map_err(|e| EngineError::io_at(wal_dir, &e, "Failed to read WAL directory"))?;

    let mut files = Vec::new();
    for entry in dir_entries {
        let entry =
            entry.map_err(|e| EngineError::io_at(wal_dir, &e, "Failed to read directory entry"))?;
        if let Some(seq) = entry.file_name().to_str().and_then(parse_sequence) {
            files.push((seq, entry.path()));
        }
    }
    files.sort();
    Ok(files)
}

/// Appends committed batches to the WAL.
pub struct WalWriter {
    file: File,
    path: PathBuf,
    /// Current file size in bytes (tracked to avoid stat calls)
    size: u64,
    wal_dir: PathBuf,
    sequence: u64,
    rotation_size: u64,
    /// A failed append may have left a partial batch; start a fresh file first
    needs_rotation: bool,
    /// A failed append could not be rolled back; refuse further writes
    poisoned: bool,
    /// Files started since the last checkpoint
    files_since_checkpoint: usize,
}

impl WalWriter {
    /// Open the WAL directory.
    ///
    /// Appends go to a new file after the highest existing one, so a tail
    /// left behind by a crash is never followed by fresh batches. An empty
    /// highest file is reused.
    pub fn new<P: AsRef<Path>>(wal_dir: P, rotation_size: u64) -> EngineResult<Self> {
        let wal_dir = wal_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&wal_dir)
            .map_err(|e| EngineError::io_at(&wal_dir, &e, "Failed to create WAL directory"))?;

        let sequence = match list_wal_files(&wal_dir)?.pop() {
            Some((seq, path)) => {
                let existing = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                if existing == 0 {
                    seq
                } else {
                    seq + 1
                }
            }
            None => 0,
        };
        let path = wal_dir.join(wal_file_name(sequence));
        let file = open_append(&path)?;
        let size = file
            .metadata()
            .map_err(|e| EngineError::io_at(&path, &e, "Failed to stat WAL file"))?
            .len();

        Ok(Self {
            file,
            path,
            size,
            wal_dir,
            sequence,
            rotation_size,
            needs_rotation: false,
            poisoned: false,
            files_since_checkpoint: 0,
        })
    }

    /// Append a batch and its commit marker in one write.
    ///
    /// With `sync` the call returns only after the bytes are durable. An
    /// empty batch writes nothing. On any failure the file is cut back to
    /// its size before the call, so recovery never replays a batch whose
    /// commit reported an error.
    pub fn append_batch(&mut self, batch: &WriteBatch, sync: bool) -> EngineResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        if self.poisoned {
            return Err(EngineError::WalPoisoned { path: self.path.clone() });
        }

        let mut buf = Vec::new();
        for op in batch.ops() {
            match op {
                BatchOp::Put { key, value } => {
                    serialize_into(&mut buf, key, value, Operation::Put)?
                }
                BatchOp::Delete { key } => serialize_into(&mut buf, key, &[], Operation::Delete)?,
            }
        }
        serialize_commit(&mut buf, batch.len() as u32)?;

        if self.needs_rotation
            || (self.size > 0 && self.size + buf.len() as u64 > self.rotation_size)
        {
            self.rotate()?;
        }

        let start = self.size;
        if let Err(e) = self.file.write_all(&buf) {
            let err = EngineError::io_at(&self.path, &e, "WAL write failed");
            self.abandon_append(start);
            return Err(err);
        }
        if sync {
            if let Err(err) = self.sync() {
                self.abandon_append(start);
                return Err(err);
            }
        }
        self.size += buf.len() as u64;

        debug!(ops = batch.len(), bytes = buf.len(), synced = sync, "WAL batch appended");
        Ok(())
    }

    /// Cut the current file back to `len` after a failed append and move
    /// later appends to a fresh file. If the cut itself fails the writer
    /// is poisoned.
    fn abandon_append(&mut self, len: u64) {
        self.needs_rotation = true;
        let rolled_back = self.file.set_len(len).and_then(|()| self.file.sync_all());
        if let Err(e) = rolled_back {
            warn!(
                path = %self.path.display(),
                error = %e,
                "could not roll back failed WAL append, refusing further writes"
            );
            self.poisoned = true;
        }
    }

    /// Sync the current WAL file to persistent storage.
    pub fn sync(&self) -> EngineResult<()> {
        durable_sync(&self.file)
            .map_err(|e| EngineError::io_at(&self.path, &e, "WAL durable_sync failed"))
    }

    /// Switch to a new WAL file. Syncs the current one first.
    fn rotate(&mut self) -> EngineResult<()> {
        self.sync()?;

        let sequence = self.sequence + 1;
        let path = self.wal_dir.join(wal_file_name(sequence));
        self.file = open_append(&path)?;
        self.path = path;
        self.sequence = sequence;
        self.size = 0;
        self.needs_rotation = false;
        self.files_since_checkpoint += 1;
        debug!(path = %self.path.display(), "WAL rotated");
        Ok(())
    }

    /// Replace every WAL file with a snapshot of `live`, the table that
    /// replaying the current WAL produces.
    ///
    /// The snapshot becomes durable before any older file is deleted, and
    /// older files are deleted oldest first, so a crash at any point still
    /// recovers the same table.
    pub fn checkpoint<'a, I>(&mut self, live: I) -> EngineResult<CheckpointResult>
    where
        I: IntoIterator<Item = (&'a Vec<u8>, &'a Vec<u8>)>,
    {
        let sequence = self.sequence + 1;
        let path = self.wal_dir.join(wal_file_name(sequence));
        let (live_entries, bytes) = write_snapshot(&path, live)?;

        // From here on the snapshot is part of the log; never append below it
        self.sequence = sequence;
        self.needs_rotation = true;
        self.file = open_append(&path)?;
        self.path = path.clone();
        self.size = bytes;
        self.needs_rotation = false;
        self.poisoned = false;
        self.files_since_checkpoint = 0;

        let mut removed_files = 0;
        for (seq, old) in list_wal_files(&self.wal_dir)? {
            if seq >= sequence {
                break;
            }
            match std::fs::remove_file(&old) {
                Ok(()) => removed_files += 1,
                Err(e) => {
                    warn!(
                        path = %old.display(),
                        error = %e,
                        "could not delete checkpointed WAL file"
                    );
                    break;
                }
            }
        }
        sync_dir(&self.wal_dir)?;

        debug!(path = %path.display(), live_entries, removed_files, "WAL checkpointed");
        Ok(CheckpointResult { file_path: path, live_entries, bytes, removed_files })
    }

    pub fn current_path(&self) -> &Path {
        &self.path
    }

    pub fn current_size(&self) -> u64 {
        self.size
    }

    pub fn files_since_checkpoint(&self) -> usize {
        self.files_since_checkpoint
    }
}

fn open_append(path: &Path) -> EngineResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| EngineError::io_at(path, &e, "Failed to open WAL file"))
}

/// What recovery found in the WAL directory.
#[derive(Debug, Default)]
pub struct Recovery {
    /// Committed batches in log order
    pub batches: Vec<WriteBatch>,
    pub files: usize,
    /// Entries dropped: corrupt, torn, or belonging to an uncommitted batch
    pub discarded_entries: usize,
}

/// Replays WAL files.
pub struct WalReader {
    wal_dir: PathBuf,
}

impl WalReader {
    pub fn new<P: AsRef<Path>>(wal_dir: P) -> Self {
        Self { wal_dir: wal_dir.as_ref().to_path_buf() }
    }

    /// Recover every committed batch, in sequence order across files.
    pub fn recover(&self) -> EngineResult<Recovery> {
        let wal_files = list_wal_files(&self.wal_dir)?;

        let mut recovery = Recovery { files: wal_files.len(), ..Recovery::default() };
        for (_, path) in &wal_files {
            self.recover_file(path, &mut recovery)?;
        }
        Ok(recovery)
    }

    /// Recover one file. Pending ops never carry over into the next file.
    fn recover_file(&self, path: &Path, recovery: &mut Recovery) -> EngineResult<()> {
        let mut buffer = Vec::new();
        File::open(path)
            .and_then(|mut f| f.read_to_end(&mut buffer))
            .map_err(|e| EngineError::io_at(path, &e, "Failed to read WAL file"))?;

        let mut pending = WriteBatch::new();
        let mut offset = 0;

        while offset + HEADER_SIZE <= buffer.len() {
            if buffer[offset..offset + 4] != MAGIC_ARRAY {
                warn!(path = %path.display(), offset, "bad magic, scanning for next entry");
                recovery.discarded_entries += 1;
                match find_next_magic(&buffer, offset + 1) {
                    Some(next) => {
                        offset = next;
                        continue;
                    }
                    None => break,
                }
            }

            let total = entry_len(&buffer[offset..]).unwrap_or(usize::MAX);
            if total > buffer.len() - offset {
                // Crash point: everything from here on is incomplete.
                warn!(
                    path = %path.display(),
                    offset,
                    need = total,
                    have = buffer.len() - offset,
                    "torn write"
                );
                recovery.discarded_entries += 1;
                break;
            }

            match deserialize_entry(&buffer[offset..offset + total]) {
                Ok(entry) => {
                    offset += total;
                    match entry.operation {
                        Operation::Put => {
                            pending.push(BatchOp::Put { key: entry.key, value: entry.value })
                        }
                        Operation::Delete => pending.push(BatchOp::Delete { key: entry.key }),
                        Operation::Commit => {
                            let batch = std::mem::take(&mut pending);
                            if entry.commit_count() == Some(batch.len() as u32) {
                                recovery.batches.push(batch);
                            } else {
                                warn!(
                                    path = %path.display(),
                                    offset,
                                    expected = ?entry.commit_count(),
                                    found = batch.len(),
                                    "commit marker does not match batch, dropping batch"
                                );
                                recovery.discarded_entries += batch.len();
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        offset,
                        error = %e,
                        "corrupt entry, scanning for next entry"
                    );
                    recovery.discarded_entries += 1;
                    match find_next_magic(&buffer, offset + 1) {
                        Some(next) => {
                            offset = next;
                            continue;
                        }
                        None => break,
                    }
                }
            }
        }

        if !pending.is_empty() {
            warn!(
                path = %path.display(),
                entries = pending.len(),
                "uncommitted batch at end of file, dropping"
            );
            recovery.discarded_entries += pending.len();
        }
        Ok(())
    }
}

/// Scan forward for the next magic; used to resync after corruption.
fn find_next_magic(buffer: &[u8], start: usize) -> Option<usize> {
    buffer
        .get(start..)?
        .windows(MAGIC_ARRAY.len())
        .position(|w| w == MAGIC_ARRAY)
        .map(|i| start + i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ROTATE: u64 = 100 * 1024 * 1024;

    fn batch(ops: &[(&str, Option<&str>)]) -> WriteBatch {
        ops.iter()
            .map(|&(k, v)| match v {
                Some(v) => BatchOp::Put {
                    key: k.as_bytes().to_vec(),
                    value: v.as_bytes().to_vec(),
                },
                None => BatchOp::Delete { key: k.as_bytes().to_vec() },
            })
            .collect()
    }

    #[test]
    fn test_batches_roundtrip() {
        let temp = TempDir::new().unwrap();

        let mut writer = WalWriter::new(temp.path(), ROTATE).unwrap();
        let pair = batch(&[("key1", Some("value1")), ("key2", Some("value2"))]);
        writer.append_batch(&pair, true).unwrap();
        writer.append_batch(&batch(&[("key1", None)]), true).unwrap();
        drop(writer);

        let recovery = WalReader::new(temp.path()).recover().unwrap();
        assert_eq!(recovery.batches.len(), 2);
        assert_eq!(recovery.batches[0].len(), 2);
        assert_eq!(recovery.batches[1].ops()[0], BatchOp::Delete { key: b"key1".to_vec() });
        assert_eq!(recovery.discarded_entries, 0);
    }

    #[test]
    fn test_empty_batch_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let mut writer = WalWriter::new(temp.path(), ROTATE).unwrap();
        writer.append_batch(&WriteBatch::new(), true).unwrap();
        assert_eq!(writer.current_size(), 0);
    }

    #[test]
    fn test_uncommitted_tail_is_dropped() {
        let temp = TempDir::new().unwrap();

        let mut writer = WalWriter::new(temp.path(), ROTATE).unwrap();
        writer.append_batch(&batch(&[("committed", Some("yes"))]), true).unwrap();
        let wal_path = writer.current_path().to_path_buf();
        drop(writer);

        // Entries of a second batch whose commit marker never made it to disk
        let mut data = std::fs::read(&wal_path).unwrap();
        serialize_into(&mut data, b"half", b"done", Operation::Put).unwrap();
        serialize_into(&mut data, b"other", b"", Operation::Delete).unwrap();
        std::fs::write(&wal_path, data).unwrap();

        let recovery = WalReader::new(temp.path()).recover().unwrap();
        assert_eq!(recovery.batches.len(), 1);
        assert_eq!(recovery.batches[0].ops()[0].key(), b"committed");
        assert_eq!(recovery.discarded_entries, 2);
    }

    #[test]
    fn test_corrupt_entry_drops_only_its_batch() {
        let temp = TempDir::new().unwrap();

        let mut writer = WalWriter::new(temp.path(), ROTATE).unwrap();
        writer.append_batch(&batch(&[("good1", Some("val1"))]), true).unwrap();
        let after_first = writer.current_size() as usize;
        let pair = batch(&[("bad2", Some("val2")), ("bad3", Some("val3"))]);
        writer.append_batch(&pair, true).unwrap();
        writer.append_batch(&batch(&[("good4", Some("val4"))]), true).unwrap();
        let wal_path = writer.current_path().to_path_buf();
        drop(writer);

        // Flip a payload byte of the second batch's first entry
        let mut data = std::fs::read(&wal_path).unwrap();
        data[after_first + HEADER_SIZE + 10] ^= 0xFF;
        std::fs::write(&wal_path, data).unwrap();

        let recovery = WalReader::new(temp.path()).recover().unwrap();
        let keys: Vec<&[u8]> = recovery.batches.iter().map(|b| b.ops()[0].key()).collect();
        assert_eq!(keys, vec![b"good1".as_slice(), b"good4".as_slice()]);
        assert!(recovery.discarded_entries >= 2);
    }

    #[test]
    fn test_torn_write_stops_cleanly() {
        let temp = TempDir::new().unwrap();

        let mut writer = WalWriter::new(temp.path(), ROTATE).unwrap();
        writer.append_batch(&batch(&[("complete", Some("entry"))]), true).unwrap();
        let wal_path = writer.current_path().to_path_buf();
        drop(writer);

        let mut data = std::fs::read(&wal_path).unwrap();
        data.extend_from_slice(&MAGIC_ARRAY);
        data.extend_from_slice(&[0xFF, 0x00, 0x00, 0x00]);
        data.extend_from_slice(&[0u8; HEADER_SIZE - 8]);
        std::fs::write(&wal_path, data).unwrap();

        let recovery = WalReader::new(temp.path()).recover().unwrap();
        assert_eq!(recovery.batches.len(), 1);
        assert_eq!(recovery.batches[0].ops()[0].key(), b"complete");
    }

    #[test]
    fn test_rotation_keeps_batches_whole() {
        let temp = TempDir::new().unwrap();

        let mut writer = WalWriter::new(temp.path(), 256).unwrap();
        for i in 0..10u8 {
            let mut b = WriteBatch::new();
            b.put(vec![i], vec![i; 100]).put(vec![i, i], vec![i; 100]);
            writer.append_batch(&b, false).unwrap();
        }
        writer.sync().unwrap();
        drop(writer);

        let recovery = WalReader::new(temp.path()).recover().unwrap();
        assert!(recovery.files > 1);
        assert_eq!(recovery.batches.len(), 10);
        assert!(recovery.batches.iter().all(|b| b.len() == 2));
    }

    #[test]
    fn test_writer_resumes_highest_sequence() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(wal_file_name(7)), b"").unwrap();

        let writer = WalWriter::new(temp.path(), ROTATE).unwrap();
        let name = writer.current_path().file_name().unwrap().to_str().unwrap().to_string();
        assert_eq!(parse_sequence(&name), Some(7));
        assert!(name.ends_with(WAL_SUFFIX));
    }

    #[test]
    fn test_writer_never_appends_after_old_tail() {
        let temp = TempDir::new().unwrap();
        let mut writer = WalWriter::new(temp.path(), ROTATE).unwrap();
        writer.append_batch(&batch(&[("a", Some("1"))]), true).unwrap();
        let first = writer.current_path().to_path_buf();
        drop(writer);

        let writer = WalWriter::new(temp.path(), ROTATE).unwrap();
        assert_ne!(writer.current_path(), first.as_path());
        assert_eq!(writer.current_size(), 0);
    }

    #[test]
    fn test_abandoned_append_is_never_replayed() {
        let temp = TempDir::new().unwrap();

        let mut writer = WalWriter::new(temp.path(), ROTATE).unwrap();
        writer.append_batch(&batch(&[("kept", Some("1"))]), true).unwrap();
        let start = writer.current_size();
        let first = writer.current_path().to_path_buf();

        // Bytes reached the file but the sync reported failure
        writer.append_batch(&batch(&[("failed", Some("2"))]), false).unwrap();
        writer.abandon_append(start);
        assert_eq!(std::fs::metadata(&first).unwrap().len(), start);

        writer.append_batch(&batch(&[("later", Some("3"))]), true).unwrap();
        assert_ne!(writer.current_path(), first.as_path());
        drop(writer);

        let recovery = WalReader::new(temp.path()).recover().unwrap();
        let keys: Vec<&[u8]> = recovery.batches.iter().map(|b| b.ops()[0].key()).collect();
        assert_eq!(keys, vec![b"kept".as_slice(), b"later".as_slice()]);
        assert_eq!(recovery.discarded_entries, 0);
    }

    #[test]
    fn test_checkpoint_replaces_history() {
        let temp = TempDir::new().unwrap();

        let mut writer = WalWriter::new(temp.path(), 256).unwrap();
        let mut table = hashbrown::HashMap::new();
        for i in 0..20u8 {
            let mut b = WriteBatch::new();
            b.put(vec![i % 4], vec![i; 64]).delete(vec![i % 4 + 100]);
            writer.append_batch(&b, false).unwrap();
            b.apply_to(&mut table);
        }
        assert!(writer.files_since_checkpoint() > 0);

        let result = writer.checkpoint(table.iter()).unwrap();
        assert_eq!(result.live_entries, 4);
        assert!(result.removed_files > 1);
        assert_eq!(writer.files_since_checkpoint(), 0);

        writer.append_batch(&batch(&[("after", Some("x"))]), true).unwrap();
        drop(writer);

        let recovery = WalReader::new(temp.path()).recover().unwrap();
        assert_eq!(recovery.files, 1);
        let mut recovered = hashbrown::HashMap::new();
        for b in &recovery.batches {
            b.apply_to(&mut recovered);
        }
        assert_eq!(recovered.remove(b"after".as_slice()), Some(b"x".to_vec()));
        assert_eq!(recovered, table);
    }

    #[test]
    fn test_leftover_checkpoint_temp_file_is_ignored() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("wal-0000000000000009.etrn.tmp"), b"garbage").unwrap();

        let recovery = WalReader::new(temp.path()).recover().unwrap();
        assert_eq!(recovery.files, 0);
        let writer = WalWriter::new(temp.path(), ROTATE).unwrap();
        assert_eq!(writer.current_path().file_name().unwrap(), wal_file_name(0).as_str());
    }

    #[test]
    fn test_empty_wal_directory() {
        let temp = TempDir::new().unwrap();
        let recovery = WalReader::new(temp.path()).recover().unwrap();
        assert!(recovery.batches.is_empty());
        assert_eq!(recovery.files, 0);
    }

    #[test]
    fn test_find_next_magic() {
        let mut buf = vec![0u8; 5];
        buf.extend_from_slice(&MAGIC_ARRAY);
        assert_eq!(find_next_magic(&buf, 0), Some(5));
        assert_eq!(find_next_magic(&buf, 6), None);
        assert_eq!(find_next_magic(&buf, 100), None);
    }
}
