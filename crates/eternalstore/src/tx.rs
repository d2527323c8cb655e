//! Read views and buffered write transactions.
//!
//! Reads outside a call go straight to the backend. A mutating call runs in
//! a `WriteTx`: its writes are buffered in an overlay (read-your-writes) and
//! reach the backend as one `WriteBatch` on `commit`. Dropping a `WriteTx`
//! without committing discards everything it buffered.

use hashbrown::HashMap;
use tracing::debug;

use eternalstore_core::{Backend, BatchOp, WriteBatch};

use crate::error::StorageResult;

/// Key lookup used by the list and scalar algorithms.
pub trait ReadView {
    fn read(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;
}

/// Committed state of a backend.
pub struct Committed<'a, B: Backend + ?Sized>(pub &'a B);

impl<B: Backend + ?Sized> ReadView for Committed<'_, B> {
    fn read(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.0.get(key)?)
    }
}

/// Buffered read-write transaction.
pub struct WriteTx<'a, B: Backend + ?Sized> {
    backend: &'a B,
    /// Final state per touched key: `Some` = put, `None` = delete
    slots: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    index: HashMap<Vec<u8>, usize>,
}

impl<'a, B: Backend + ?Sized> WriteTx<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend, slots: Vec::new(), index: HashMap::new() }
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.stage(key, Some(value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.stage(key, None);
    }

    fn stage(&mut self, key: Vec<u8>, value: Option<Vec<u8>>) {
        match self.index.get(&key) {
            Some(&i) => self.slots[i].1 = value,
            None => {
                self.index.insert(key.clone(), self.slots.len());
                self.slots.push((key, value));
            }
        }
    }

    /// Number of distinct keys touched.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The buffered writes as a batch, in first-touch order.
    pub fn into_batch(self) -> WriteBatch {
        self.slots
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => BatchOp::Put { key, value },
                None => BatchOp::Delete { key },
            })
            .collect()
    }

    /// Commit every buffered write atomically.
    pub fn commit(self) -> StorageResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        debug!(keys = self.len(), "committing write transaction");
        let backend = self.backend;
        let batch = self.into_batch();
        backend.commit(batch)?;
        Ok(())
    }
}

impl<B: Backend + ?Sized> ReadView for WriteTx<'_, B> {
    fn read(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        match self.index.get(key) {
            Some(&i) => Ok(self.slots[i].1.clone()),
            None => Ok(self.backend.get(key)?),
        }
    }
}
