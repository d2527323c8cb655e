//! Engine configuration
//!
//! Two presets cover the usual trade-off between per-commit durability and
//! write throughput; individual fields can be adjusted afterwards.

use crate::error::{EngineError, EngineResult};
use crate::format::{MAX_KEY_SIZE, MAX_VALUE_SIZE};

/// When a committed batch is forced to persistent media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Every commit ends with a platform durable sync
    Durable,
    /// Commits reach the OS page cache only; call `sync_wal()` to persist
    Relaxed,
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// WAL file rotation threshold (bytes)
    pub wal_rotation_size_bytes: u64,
    /// Maximum key size in bytes
    pub max_key_size: usize,
    /// Maximum value size in bytes
    pub max_value_size: usize,
    /// Sync behaviour of `commit`
    pub sync_mode: SyncMode,
    /// Checkpoint once this many WAL files were started since the last one
    pub checkpoint_after_files: usize,
}

impl Config {
    /// fsync per commit. The right choice for a store whose state must
    /// outlive the process that wrote it.
    pub fn durable() -> Self {
        Self {
            wal_rotation_size_bytes: 100 * 1024 * 1024,
            max_key_size: 128,
            max_value_size: 32 * 1024 * 1024,
            sync_mode: SyncMode::Durable,
            checkpoint_after_files: 4,
        }
    }

    /// No fsync per commit; suited to tests and bulk loads.
    pub fn relaxed() -> Self {
        Self {
            wal_rotation_size_bytes: 50 * 1024 * 1024,
            max_key_size: 128,
            max_value_size: 16 * 1024 * 1024,
            sync_mode: SyncMode::Relaxed,
            checkpoint_after_files: 8,
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.wal_rotation_size_bytes < 1024 * 1024 {
            return Err("wal_rotation_size_bytes must be >= 1MB".into());
        }
        if self.max_key_size == 0 || self.max_key_size > MAX_KEY_SIZE {
            return Err(format!("max_key_size must be in [1, {}]", MAX_KEY_SIZE));
        }
        if self.max_value_size == 0 || self.max_value_size > MAX_VALUE_SIZE {
            return Err("max_value_size must be in [1, 128MB]".into());
        }
        if self.checkpoint_after_files == 0 {
            return Err("checkpoint_after_files must be >= 1".into());
        }
        Ok(())
    }

    /// `validate` lifted into the engine error type.
    pub(crate) fn check(&self) -> EngineResult<()> {
        self.validate().map_err(EngineError::InvalidConfig)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::durable()
    }
}
