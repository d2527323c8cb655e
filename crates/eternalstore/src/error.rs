//! Errors surfaced by the typed store.
//!
//! A failed call has no effects: nothing it buffered is committed.

use alloy_primitives::{Address, B256};
use thiserror::Error;

use eternalstore_core::EngineError;

use crate::value::ValueKind;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Mutating call from someone other than the latest version
    #[error("caller {caller} is not the latest version {authority}")]
    Unauthorized { caller: Address, authority: Address },

    /// `add` of a value that is already a member
    #[error("{kind} value already present in list {list_id}")]
    DuplicateValue { kind: ValueKind, list_id: B256 },

    /// `remove` of a value that is not a member
    #[error("{kind} value not found in list {list_id}")]
    NotFound { kind: ValueKind, list_id: B256 },

    #[error("index {index} out of range for {kind} list {list_id} of size {size}")]
    IndexOutOfRange { kind: ValueKind, list_id: B256, index: u64, size: u64 },

    #[error("offset {offset} out of range for {kind} list {list_id} of size {size}")]
    OffsetOutOfRange { kind: ValueKind, list_id: B256, offset: u64, size: u64 },

    /// Stored bytes are not a valid encoding of the requested type
    #[error("cannot decode {kind}: {reason}")]
    Decode { kind: ValueKind, reason: String },

    /// List bookkeeping disagrees with itself
    #[error("corrupted list state for {kind} list {list_id}: {reason}")]
    Corrupted { kind: ValueKind, list_id: B256, reason: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type StorageResult<T> = Result<T, StorageError>;
