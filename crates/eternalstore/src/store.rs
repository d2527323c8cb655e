//! The store: one backend, one access gate, every typed list and scalar.

use std::collections::VecDeque;
use std::path::Path;

use alloy_primitives::{Address, B256};
use parking_lot::{Mutex, RwLock};
use tracing::info;

use eternalstore_core::{Backend, CheckpointResult, Config, MemoryBackend, StoreEngine};

use crate::error::StorageResult;
use crate::gate::{AccessGate, StorageEvent};
use crate::keys::authority_key;
use crate::set::IndexedSet;
use crate::tx::{Committed, WriteTx};
use crate::value::StorageValue;

/// Most recent events kept by the journal; older ones are dropped first.
pub const MAX_EVENTS: usize = 1024;

/// Authority-gated typed storage over a byte `Backend`.
///
/// Mutating calls take the caller explicitly and are serialized; each one
/// commits as a single atomic batch or not at all. Reads run concurrently
/// against committed state.
///
/// A store exclusively owns its backend, and the backend is not reachable
/// from outside the crate, so every write passes the caller check:
///
/// ```compile_fail
/// # use eternalstore::{Address, EternalStorage};
/// let store = EternalStorage::in_memory(Address::ZERO).unwrap();
/// let _ = store.backend();
/// ```
///
/// ```compile_fail
/// use eternalstore::tx::WriteTx;
/// ```
pub struct EternalStorage<B: Backend = StoreEngine> {
    backend: B,
    gate: RwLock<AccessGate>,
    /// Exclusive for mutating calls, shared for reads
    call_lock: RwLock<()>,
    events: Mutex<VecDeque<StorageEvent>>,
}

impl EternalStorage<StoreEngine> {
    /// Open (or create) a durable store at `path`.
    ///
    /// `initial_authority` is only used when the store is new; an existing
    /// store keeps the authority it persisted. The directory stays locked
    /// until the store is dropped.
    pub fn open<P: AsRef<Path>>(
        path: P,
        config: Config,
        initial_authority: Address,
    ) -> StorageResult<Self> {
        let engine = StoreEngine::open(path, config)?;
        Self::with_backend(engine, initial_authority)
    }

    /// Force buffered WAL writes to disk (only meaningful in relaxed mode).
    pub fn sync(&self) -> StorageResult<()> {
        Ok(self.backend.sync_wal()?)
    }

    /// Collapse the WAL into a snapshot of the current state.
    pub fn checkpoint(&self) -> StorageResult<CheckpointResult> {
        let _call = self.call_lock.write();
        Ok(self.backend.checkpoint()?)
    }
}

impl EternalStorage<MemoryBackend> {
    /// Volatile store, mostly for tests.
    pub fn in_memory(initial_authority: Address) -> StorageResult<Self> {
        Self::with_backend(MemoryBackend::new(), initial_authority)
    }
}

impl<B: Backend> EternalStorage<B> {
    /// Takes ownership of `backend`; the authority it persisted, if any,
    /// wins over `initial_authority`.
    pub(crate) fn with_backend(backend: B, initial_authority: Address) -> StorageResult<Self> {
        let authority = match backend.get(&authority_key())? {
            Some(bytes) => {
                let persisted = Address::decode(&bytes)?;
                if persisted != initial_authority {
                    info!(authority = %persisted, "keeping persisted latest version");
                }
                persisted
            }
            None => {
                let mut tx = WriteTx::new(&backend);
                tx.put(authority_key(), initial_authority.encode());
                tx.commit()?;
                initial_authority
            }
        };

        Ok(Self {
            backend,
            gate: RwLock::new(AccessGate::new(authority)),
            call_lock: RwLock::new(()),
            events: Mutex::new(VecDeque::new()),
        })
    }

    /// The only identity allowed to mutate the store.
    pub fn latest_version(&self) -> Address {
        self.gate.read().authority()
    }

    /// Hand mutation rights to `new_version`. Only the current latest
    /// version may call this; upgrading to itself is allowed.
    pub fn upgrade_version(&self, caller: Address, new_version: Address) -> StorageResult<()> {
        let _call = self.call_lock.write();
        let mut gate = self.gate.write();
        gate.authorize(caller)?;

        let mut tx = WriteTx::new(&self.backend);
        tx.put(authority_key(), new_version.encode());
        tx.commit()?;

        let previous = gate.transfer(new_version);
        self.record(StorageEvent::VersionUpgraded { previous, new_version });
        info!(previous = %previous, new_version = %new_version, "latest version upgraded");
        Ok(())
    }

    fn record(&self, event: StorageEvent) {
        let mut events = self.events.lock();
        if events.len() == MAX_EVENTS {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Events recorded in this process, oldest first. Only the last
    /// `MAX_EVENTS` are kept; use `drain_events` to consume them.
    pub fn events(&self) -> Vec<StorageEvent> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn drain_events(&self) -> Vec<StorageEvent> {
        self.events.lock().drain(..).collect()
    }

    /// Number of engine entries the store occupies, bookkeeping included.
    pub fn stored_entries(&self) -> usize {
        self.backend.len()
    }

    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    /// Handle on the `T` list named `list_id`. Lists of different types
    /// never share state, even under the same id.
    pub fn list<T: StorageValue>(&self, list_id: B256) -> IndexedSet<'_, B, T> {
        IndexedSet::new(self, list_id)
    }

    /// Run `f` against committed state.
    pub(crate) fn view<R>(
        &self,
        f: impl FnOnce(&Committed<'_, B>) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let _call = self.call_lock.read();
        f(&Committed(&self.backend))
    }

    /// Run a mutating call: authorize `caller`, buffer `f`'s writes, commit
    /// them as one batch if `f` succeeds.
    pub(crate) fn transact<R>(
        &self,
        caller: Address,
        f: impl FnOnce(&mut WriteTx<'_, B>) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let _call = self.call_lock.write();
        self.gate.read().authorize(caller)?;

        let mut tx = WriteTx::new(&self.backend);
        let out = f(&mut tx)?;
        tx.commit()?;
        Ok(out)
    }
}

impl<B: Backend> std::fmt::Debug for EternalStorage<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EternalStorage")
            .field("latest_version", &self.latest_version())
            .field("entries", &self.backend.len())
            .finish()
    }
}
