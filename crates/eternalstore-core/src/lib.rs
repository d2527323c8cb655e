//! EternalStore Core: durable byte-keyed engine
//!
//! The storage floor underneath EternalStore's typed lists and scalars: a
//! flat `key bytes -> value bytes` map that commits whole batches atomically.
//!
//! # Architecture
//!
//! - **Read path**: served from a RAM hash table
//! - **Write path**: batch + commit marker to the write-ahead log, then RAM
//! - **Recovery**: only batches closed by a matching commit marker are replayed
//! - **Checkpoint**: the live table replaces the WAL history once enough
//!   files pile up, so replay cost tracks the live set, not the write count
//!
//! Nothing in this crate knows about value types, lists or authorities.
//! The `Backend` trait is the seam the typed layer builds on.

pub mod backend;
pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod platform_durability;
pub mod wal;

pub use backend::{Backend, MemoryBackend};
pub use batch::{BatchOp, WriteBatch};
pub use checkpoint::CheckpointResult;
pub use config::{Config, SyncMode};
pub use engine::StoreEngine;
pub use error::{EngineError, EngineResult};
pub use format::Operation;
pub use wal::{Recovery, WalReader, WalWriter};
