//! The byte-store seam.
//!
//! Everything above this crate reads single keys and commits whole
//! `WriteBatch`es; it never needs to know whether the bytes live in a WAL
//! or only in RAM.

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::batch::WriteBatch;
use crate::error::EngineResult;

/// Flat byte key-value store with atomic batch commit.
pub trait Backend: Send + Sync {
    /// Value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>>;

    fn contains_key(&self, key: &[u8]) -> bool;

    /// Number of live keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply every op of `batch` or none of them.
    fn commit(&self, batch: WriteBatch) -> EngineResult<()>;
}

/// Volatile backend: the engine's RAM table without a WAL.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn contains_key(&self, key: &[u8]) -> bool {
        self.data.read().contains_key(key)
    }

    fn len(&self) -> usize {
        self.data.read().len()
    }

    fn commit(&self, batch: WriteBatch) -> EngineResult<()> {
        batch.apply_to(&mut self.data.write());
        Ok(())
    }
}
