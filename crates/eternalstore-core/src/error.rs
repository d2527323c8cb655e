//! Error types for engine operations
//!
//! Every failure of the byte engine is an `EngineError`, carrying enough
//! context (file, offset, sizes) to diagnose WAL damage after a crash.

use std::path::PathBuf;

use thiserror::Error;

/// Engine error types with detailed context
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// I/O operation failed
    #[error("I/O error{}: {message} ({kind})", .path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// WAL content is structurally invalid
    #[error("WAL corrupted in {} at offset {offset}: {reason}", .path.display())]
    WalCorrupted {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    /// Checksum verification failed
    #[error("Checksum mismatch in {} at offset {offset}: expected 0x{expected:08x}, got 0x{actual:08x}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: u32,
        actual: u32,
        offset: u64,
    },

    /// Partial write at the end of a WAL file
    #[error("Torn write in {} at offset {offset}: expected {expected_size} bytes, only {available_bytes} available", .path.display())]
    TornWrite {
        path: PathBuf,
        expected_size: u32,
        available_bytes: u64,
        offset: u64,
    },

    /// Key or value exceeds the configured limit
    #[error("Entry {component} too large: {entry_size} bytes exceeds limit of {max_size} bytes")]
    OversizedEntry {
        entry_size: u64,
        max_size: u64,
        /// "key" or "value"
        component: String,
    },

    /// Magic bytes not found at expected location
    #[error("Magic bytes not found in {} at offset {offset}: found {}", .path.display(), hex4(.found_bytes))]
    NoMagicFound {
        path: PathBuf,
        offset: u64,
        found_bytes: [u8; 4],
    },

    /// Configuration rejected by `Config::validate`
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A failed append could not be rolled back; the WAL takes no more writes
    #[error("WAL {} is unusable after a failed append", .path.display())]
    WalPoisoned { path: PathBuf },

    /// Another engine holds the directory lock
    #[error("Store directory {} is locked by another engine", .path.display())]
    Locked { path: PathBuf },
}

fn hex4(bytes: &[u8; 4]) -> String {
    format!("{:02x}{:02x}{:02x}{:02x}", bytes[0], bytes[1], bytes[2], bytes[3])
}

impl EngineError {
    /// Wrap an I/O error with the file it happened on.
    pub fn io_at(path: impl Into<PathBuf>, err: &std::io::Error, what: &str) -> Self {
        EngineError::Io {
            path: Some(path.into()),
            kind: err.kind(),
            message: format!("{}: {}", what, err),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
