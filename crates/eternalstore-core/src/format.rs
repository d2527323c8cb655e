//! Binary format of WAL entries
//!
//! Every entry is a 32-byte `EntryHeader` followed by its payload:
//! key_len(u16) + value_len(u32) + operation(u8) + padding(u8) + key + value
//!
//! A committed batch is a run of `Put`/`Delete` entries closed by one
//! `Commit` entry whose value is the batch length (u32 LE) and whose key is
//! empty.

use std::path::PathBuf;

use crate::error::{EngineError, EngineResult};

/// Magic bytes identifying WAL entries: "ETRN"
pub const MAGIC_ARRAY: [u8; 4] = *b"ETRN";

/// Hard upper bound on key size, independent of `Config`
pub const MAX_KEY_SIZE: usize = 1024;

/// Hard upper bound on value size (128MB), independent of `Config`
pub const MAX_VALUE_SIZE: usize = 128 * 1024 * 1024;

/// Header size in bytes
pub const HEADER_SIZE: usize = 32;

/// Fixed payload prefix: key_len + value_len + op + pad
const PAYLOAD_PREFIX: usize = 8;

/// WAL operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Operation {
    /// Insert or update a key-value pair
    Put = 1,
    /// Delete a key
    Delete = 2,
    /// Close the preceding batch
    Commit = 3,
}

impl Operation {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Operation::Put),
            2 => Some(Operation::Delete),
            3 => Some(Operation::Commit),
            _ => None,
        }
    }
}

/// Fixed-size header for each WAL entry
///
/// Layout:
///   [0..4]   magic:      "ETRN"
///   [4..8]   length:     u32  - payload length in bytes
///   [8..12]  checksum:   u32  - CRC32C of payload bytes
///   [12]     entry_type: u8   - operation type
///   [13..32] reserved, zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub magic: [u8; 4],
    pub length: u32,
    pub checksum: u32,
    pub entry_type: u8,
}

/// One decoded WAL entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub operation: Operation,
}

impl WalEntry {
    /// Batch length carried by a `Commit` entry.
    pub fn commit_count(&self) -> Option<u32> {
        if self.operation != Operation::Commit {
            return None;
        }
        let bytes: [u8; 4] = self.value.as_slice().try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }
}

impl EntryHeader {
    pub fn new(length: u32, checksum: u32, op: Operation) -> Self {
        Self { magic: MAGIC_ARRAY, length, checksum, entry_type: op as u8 }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..8].copy_from_slice(&self.length.to_le_bytes());
        buf[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        buf[12] = self.entry_type;
        buf
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            length: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            checksum: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            entry_type: bytes[12],
        }
    }
}

fn buffer_path() -> PathBuf {
    PathBuf::from("<buffer>")
}

/// Serialize one operation into a complete WAL entry, appending to `out`.
///
/// Sizes are checked BEFORE any allocation.
pub fn serialize_into(
    out: &mut Vec<u8>,
    key: &[u8],
    value: &[u8],
    op: Operation,
) -> EngineResult<()> {
    if key.len() > MAX_KEY_SIZE {
        return Err(EngineError::OversizedEntry {
            entry_size: key.len() as u64,
            max_size: MAX_KEY_SIZE as u64,
            component: "key".to_string(),
        });
    }
    if value.len() > MAX_VALUE_SIZE {
        return Err(EngineError::OversizedEntry {
            entry_size: value.len() as u64,
            max_size: MAX_VALUE_SIZE as u64,
            component: "value".to_string(),
        });
    }

    let payload_start = out.len() + HEADER_SIZE;
    out.reserve(HEADER_SIZE + PAYLOAD_PREFIX + key.len() + value.len());
    out.extend_from_slice(&[0u8; HEADER_SIZE]);
    out.extend_from_slice(&(key.len() as u16).to_le_bytes());
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.push(op as u8);
    out.push(0);
    out.extend_from_slice(key);
    out.extend_from_slice(value);

    let payload = &out[payload_start..];
    let header = EntryHeader::new(payload.len() as u32, crc32c::crc32c(payload), op);
    out[payload_start - HEADER_SIZE..payload_start].copy_from_slice(&header.to_bytes());
    Ok(())
}

/// Serialize a single entry into a fresh buffer.
pub fn serialize_entry(key: &[u8], value: &[u8], op: Operation) -> EngineResult<Vec<u8>> {
    let mut buf = Vec::new();
    serialize_into(&mut buf, key, value, op)?;
    Ok(buf)
}

/// Serialize the `Commit` marker closing a batch of `count` entries.
pub fn serialize_commit(out: &mut Vec<u8>, count: u32) -> EngineResult<()> {
    serialize_into(out, &[], &count.to_le_bytes(), Operation::Commit)
}

/// Deserialize a WAL entry from the start of `data`.
pub fn deserialize_entry(data: &[u8]) -> EngineResult<WalEntry> {
    let header_bytes: &[u8; HEADER_SIZE] = data
        .get(..HEADER_SIZE)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| EngineError::WalCorrupted {
            path: buffer_path(),
            offset: 0,
            reason: format!("Entry too short: {} bytes, need at least {}", data.len(), HEADER_SIZE),
        })?;
    let header = EntryHeader::from_bytes(header_bytes);

    if header.magic != MAGIC_ARRAY {
        return Err(EngineError::NoMagicFound {
            path: buffer_path(),
            offset: 0,
            found_bytes: header.magic,
        });
    }

    let payload_end = HEADER_SIZE + header.length as usize;
    if data.len() < payload_end {
        return Err(EngineError::TornWrite {
            path: buffer_path(),
            expected_size: header.length,
            available_bytes: (data.len() - HEADER_SIZE) as u64,
            offset: HEADER_SIZE as u64,
        });
    }

    let payload = &data[HEADER_SIZE..payload_end];
    let computed = crc32c::crc32c(payload);
    if computed != header.checksum {
        return Err(EngineError::ChecksumMismatch {
            path: buffer_path(),
            expected: header.checksum,
            actual: computed,
            offset: HEADER_SIZE as u64,
        });
    }

    if payload.len() < PAYLOAD_PREFIX {
        return Err(EngineError::WalCorrupted {
            path: buffer_path(),
            offset: HEADER_SIZE as u64,
            reason: "Payload too short for header fields".to_string(),
        });
    }

    let key_len = u16::from_le_bytes([payload[0], payload[1]]) as usize;
    let value_len = u32::from_le_bytes([payload[2], payload[3], payload[4], payload[5]]) as usize;
    let operation = Operation::from_byte(payload[6]).ok_or_else(|| EngineError::WalCorrupted {
        path: buffer_path(),
        offset: (HEADER_SIZE + 6) as u64,
        reason: format!("Invalid operation type: {}", payload[6]),
    })?;

    let key_end = PAYLOAD_PREFIX + key_len;
    let value_end = key_end + value_len;
    if payload.len() != value_end {
        return Err(EngineError::WalCorrupted {
            path: buffer_path(),
            offset: HEADER_SIZE as u64,
            reason: format!(
                "Payload is {} bytes, key({}) + value({}) need {}",
                payload.len(), key_len, value_len, value_end
            ),
        });
    }

    Ok(WalEntry {
        key: payload[PAYLOAD_PREFIX..key_end].to_vec(),
        value: payload[key_end..value_end].to_vec(),
        operation,
    })
}

/// Total on-disk size of the entry whose header starts `data`, if readable.
pub fn entry_len(data: &[u8]) -> Option<usize> {
    let len = data.get(4..8)?;
    Some(HEADER_SIZE + u32::from_le_bytes([len[0], len[1], len[2], len[3]]) as usize)
}
