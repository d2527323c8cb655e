//! Durable storage engine.
//!
//! `StoreEngine` keeps the whole working set in a RAM hash table and makes
//! it durable through the WAL.
//!
//! **Read path**: RAM only (RwLock, concurrent readers)
//! **Write path**: whole batch to the WAL first, then RAM
//! **Open**: replay committed batches from the WAL

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::batch::{BatchOp, WriteBatch};
use crate::checkpoint::CheckpointResult;
use crate::config::{Config, SyncMode};
use crate::error::{EngineError, EngineResult};
use crate::wal::{WalReader, WalWriter};

/// RAM hash table + WAL.
///
/// All methods take `&self`. Readers share the table lock; committers
/// serialize on the WAL mutex and hold it while applying to RAM, so RAM
/// sees batches in log order.
pub struct StoreEngine {
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
    wal: Mutex<WalWriter>,
    path: PathBuf,
    config: Config,
    /// Exclusive lock on `LOCK`, held for the engine's lifetime
    _lock: File,
}

impl StoreEngine {
    /// Open or create an engine at `path`, replaying the WAL.
    ///
    /// Fails with `EngineError::Locked` while another engine has the same
    /// directory open.
    pub fn open<P: AsRef<Path>>(path: P, config: Config) -> EngineResult<Self> {
        config.check()?;

        let path = path.as_ref().to_path_buf();
        let wal_dir = path.join("wal");
        std::fs::create_dir_all(&wal_dir)
            .map_err(|e| EngineError::io_at(&wal_dir, &e, "Failed to create WAL directory"))?;
        let lock = lock_dir(&path)?;

        let recovery = WalReader::new(&wal_dir).recover()?;
        let mut data = HashMap::new();
        for batch in &recovery.batches {
            batch.apply_to(&mut data);
        }

        if recovery.discarded_entries > 0 {
            warn!(
                path = %wal_dir.display(),
                discarded = recovery.discarded_entries,
                "WAL recovery dropped incomplete or corrupt entries"
            );
        }
        if !recovery.batches.is_empty() {
            info!(
                path = %wal_dir.display(),
                files = recovery.files,
                batches = recovery.batches.len(),
                keys = data.len(),
                "recovered store from WAL"
            );
        }

        let mut wal = WalWriter::new(&wal_dir, config.wal_rotation_size_bytes)?;
        if recovery.files > 1 {
            let result = wal.checkpoint(data.iter())?;
            info!(
                path = %result.file_path.display(),
                live = result.live_entries,
                removed_files = result.removed_files,
                "checkpointed WAL after recovery"
            );
        }

        Ok(Self {
            data: RwLock::new(data),
            wal: Mutex::new(wal),
            path,
            config,
            _lock: lock,
        })
    }

    /// Rewrite the WAL as a single snapshot of the live table.
    pub fn checkpoint(&self) -> EngineResult<CheckpointResult> {
        let mut wal = self.wal.lock();
        let data = self.data.read();
        let result = wal.checkpoint(data.iter())?;
        info!(
            path = %result.file_path.display(),
            live = result.live_entries,
            removed_files = result.removed_files,
            "WAL checkpointed"
        );
        Ok(result)
    }

    /// Commit a single put.
    pub fn put(&self, key: &[u8], value: &[u8]) -> EngineResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.commit(batch)
    }

    /// Commit a single delete.
    pub fn delete(&self, key: &[u8]) -> EngineResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.commit(batch)
    }

    /// Force the WAL to persistent storage. Needed after relaxed commits.
    pub fn sync_wal(&self) -> EngineResult<()> {
        self.wal.lock().sync()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check the configured size limits before anything reaches the WAL.
    fn check_limits(&self, batch: &WriteBatch) -> EngineResult<()> {
        for op in batch.ops() {
            let key = op.key();
            if key.len() > self.config.max_key_size {
                return Err(EngineError::OversizedEntry {
                    entry_size: key.len() as u64,
                    max_size: self.config.max_key_size as u64,
                    component: "key".to_string(),
                });
            }
            if let BatchOp::Put { value, .. } = op {
                if value.len() > self.config.max_value_size {
                    return Err(EngineError::OversizedEntry {
                        entry_size: value.len() as u64,
                        max_size: self.config.max_value_size as u64,
                        component: "value".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Backend for StoreEngine {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn contains_key(&self, key: &[u8]) -> bool {
        self.data.read().contains_key(key)
    }

    fn len(&self) -> usize {
        self.data.read().len()
    }

    /// WRITE ORDERING:
    /// 1. Size limits
    /// 2. WAL append of the batch + commit marker (synced in `Durable` mode)
    /// 3. RAM apply
    ///
    /// If the WAL write fails, RAM is NEVER modified.
    fn commit(&self, batch: WriteBatch) -> EngineResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.check_limits(&batch)?;

        let mut wal = self.wal.lock();
        wal.append_batch(&batch, self.config.sync_mode == SyncMode::Durable)?;
        batch.apply_to(&mut self.data.write());
        debug!(ops = batch.len(), "batch committed");

        // The batch is durable either way; a failed checkpoint is retried
        // on the next commit.
        if wal.files_since_checkpoint() >= self.config.checkpoint_after_files {
            let data = self.data.read();
            if let Err(e) = wal.checkpoint(data.iter()) {
                warn!(error = %e, "WAL checkpoint failed");
            }
        }
        Ok(())
    }
}

/// Take the exclusive directory lock.
fn lock_dir(path: &Path) -> EngineResult<File> {
    let lock_path = path.join("LOCK");
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| EngineError::io_at(&lock_path, &e, "Failed to open lock file"))?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
            Err(EngineError::Locked { path: path.to_path_buf() })
        }
        Err(e) => Err(EngineError::io_at(&lock_path, &e, "Failed to lock store directory")),
    }
}

impl std::fmt::Debug for StoreEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreEngine")
            .field("path", &self.path)
            .field("entries", &self.len())
            .field("sync_mode", &self.config.sync_mode)
            .finish()
    }
}
