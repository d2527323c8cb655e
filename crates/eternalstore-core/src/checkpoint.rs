//! Checkpoint: the live table rewritten as one committed batch
//!
//! Replaying the WAL costs time and space proportional to every write ever
//! made. A checkpoint replaces the history with the current state: one file
//! holding a `Put` for each live key and a single commit marker.
//!
//! The file is written with the atomic rename pattern:
//! 1. Write every entry to `wal-{seq}.etrn.tmp`
//! 2. durable_sync the temp file
//! 3. Rename it to `wal-{seq}.etrn` (atomic on POSIX)
//! 4. durable_sync the WAL directory
//!
//! If the process crashes at any point:
//! - Before rename: the temp file is ignored by recovery (harmless)
//! - After rename: older files replay first, then the snapshot overwrites
//!   every live key, so the recovered table is the same

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::format::{serialize_commit, serialize_into, Operation};
use crate::platform_durability::durable_sync;

/// Result of a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointResult {
    /// The snapshot file, now the first file of the WAL
    pub file_path: PathBuf,
    /// Live entries written to the snapshot
    pub live_entries: usize,
    /// Snapshot size in bytes
    pub bytes: u64,
    /// Older WAL files deleted after the snapshot became durable
    pub removed_files: usize,
}

/// Write `entries` as one committed batch to `final_path`, durably.
///
/// An empty table produces an empty file.
pub(crate) fn write_snapshot<'a, I>(final_path: &Path, entries: I) -> EngineResult<(usize, u64)>
where
    I: IntoIterator<Item = (&'a Vec<u8>, &'a Vec<u8>)>,
{
    let mut buf = Vec::new();
    let mut count: usize = 0;
    for (key, value) in entries {
        serialize_into(&mut buf, key, value, Operation::Put)?;
        count += 1;
    }
    if count > 0 {
        let marker = u32::try_from(count).map_err(|_| EngineError::OversizedEntry {
            entry_size: count as u64,
            max_size: u32::MAX as u64,
            component: "checkpoint".to_string(),
        })?;
        serialize_commit(&mut buf, marker)?;
    }

    let tmp_path = final_path.with_extension("etrn.tmp");
    {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .map_err(|e| EngineError::io_at(&tmp_path, &e, "Failed to create checkpoint file"))?;
        file.write_all(&buf)
            .map_err(|e| EngineError::io_at(&tmp_path, &e, "Failed to write checkpoint"))?;
        durable_sync(&file)
            .map_err(|e| EngineError::io_at(&tmp_path, &e, "Failed to sync checkpoint"))?;
    }

    fs::rename(&tmp_path, final_path)
        .map_err(|e| EngineError::io_at(final_path, &e, "Failed to rename checkpoint file"))?;
    if let Some(parent) = final_path.parent() {
        sync_dir(parent)?;
    }

    Ok((count, buf.len() as u64))
}

/// Persist directory metadata (renames, creations, deletions).
pub(crate) fn sync_dir(dir: &Path) -> EngineResult<()> {
    let handle = File::open(dir)
        .map_err(|e| EngineError::io_at(dir, &e, "Failed to open directory for sync"))?;
    durable_sync(&handle).map_err(|e| EngineError::io_at(dir, &e, "Failed to sync directory"))
}
