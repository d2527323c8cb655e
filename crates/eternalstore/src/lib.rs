//! EternalStore: authority-gated, iterable persistent storage
//!
//! Typed values and indexed sets of unique values, kept in a durable byte
//! engine so the data outlives any one version of the code that writes it.
//!
//! # Architecture
//!
//! - **Access gate**: one `latest_version` address may mutate; anyone may read
//! - **Indexed sets**: per `(value type, list id)`, O(1) add/remove/membership
//!   plus enumeration and pagination; removal is swap-and-pop
//! - **Scalars**: one value per `(value type, key)`, unset reads as zero
//! - **Atomicity**: every mutating call buffers its writes in a `WriteTx`
//!   and commits them as one `WriteBatch`; a failed call commits nothing
//!
//! ```no_run
//! use eternalstore::{Address, Config, EternalStorage, B256};
//!
//! let admin = Address::repeat_byte(0xaa);
//! let store = EternalStorage::open("./data", Config::durable(), admin)?;
//! let members = B256::repeat_byte(1);
//!
//! store.add_address_key(admin, members, Address::repeat_byte(7))?;
//! assert_eq!(store.get_address_key_size(members)?, 1);
//! # Ok::<(), eternalstore::StorageError>(())
//! ```

pub mod error;
pub mod facade;
pub mod gate;
mod keys;
pub mod scalar;
pub mod set;
pub mod store;
mod tx;
pub mod value;

pub use alloy_primitives::{Address, Bytes, B128, B256, B64, I256, U256};
pub use eternalstore_core::{
    Backend, CheckpointResult, Config, EngineError, MemoryBackend, StoreEngine, SyncMode,
};

pub use error::{StorageError, StorageResult};
pub use gate::{AccessGate, StorageEvent};
pub use set::IndexedSet;
pub use store::{EternalStorage, MAX_EVENTS};
pub use value::{StorageValue, ValueKind};
