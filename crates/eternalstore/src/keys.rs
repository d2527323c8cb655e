//! Composite key layout.
//!
//! Every typed entry maps to one engine key:
//! `[namespace][type tag][32-byte id][discriminator]`
//!
//! | namespace | entry            | discriminator                 |
//! |-----------|------------------|-------------------------------|
//! | `0x00`    | scalar value     | none                          |
//! | `0x01`    | list size        | none                          |
//! | `0x02`    | list order slot  | index, u64 big-endian         |
//! | `0x03`    | list position    | keccak-256 of value encoding  |
//! | `0xFF`    | store metadata   | (no tag or id)                |

use alloy_primitives::{keccak256, B256};

use crate::error::{StorageError, StorageResult};
use crate::value::{StorageValue, ValueKind};

/// Key namespace byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Namespace {
    Scalar = 0x00,
    ListSize = 0x01,
    ListOrder = 0x02,
    ListPosition = 0x03,
    Meta = 0xFF,
}

const AUTHORITY: &[u8] = b"latestVersion";

/// `[namespace][tag][id]`, with room for `extra` trailing bytes.
pub fn prefix(ns: Namespace, kind: ValueKind, id: &B256, extra: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + 32 + extra);
    key.push(ns as u8);
    key.push(kind.tag());
    key.extend_from_slice(id.as_slice());
    key
}

pub fn scalar_key(kind: ValueKind, key: &B256) -> Vec<u8> {
    prefix(Namespace::Scalar, kind, key, 0)
}

pub fn size_key(kind: ValueKind, list_id: &B256) -> Vec<u8> {
    prefix(Namespace::ListSize, kind, list_id, 0)
}

pub fn order_key(kind: ValueKind, list_id: &B256, index: u64) -> Vec<u8> {
    let mut key = prefix(Namespace::ListOrder, kind, list_id, 8);
    key.extend_from_slice(&index.to_be_bytes());
    key
}

/// Position slot of `value` in `list_id`. Hashing keeps the key length
/// fixed for variable-length values.
pub fn position_key<T: StorageValue>(list_id: &B256, value: &T) -> Vec<u8> {
    let mut key = prefix(Namespace::ListPosition, T::KIND, list_id, 32);
    key.extend_from_slice(keccak256(value.encode()).as_slice());
    key
}

pub fn authority_key() -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + AUTHORITY.len());
    key.push(Namespace::Meta as u8);
    key.extend_from_slice(AUTHORITY);
    key
}

/// Counters (sizes, 1-based positions) are stored as u64 LE.
pub fn encode_u64(n: u64) -> Vec<u8> {
    n.to_le_bytes().to_vec()
}

pub fn decode_u64(kind: ValueKind, list_id: &B256, bytes: &[u8]) -> StorageResult<u64> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| StorageError::Corrupted {
        kind,
        list_id: *list_id,
        reason: format!("counter has {} bytes, expected 8", bytes.len()),
    })?;
    Ok(u64::from_le_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, U256};

    /// Longest key the layout produces: position keys
    const MAX_LAYOUT_KEY: usize = 2 + 32 + 32;

    #[test]
    fn test_namespaces_do_not_collide() {
        let id = B256::repeat_byte(7);
        let keys = [
            scalar_key(ValueKind::U8, &id),
            size_key(ValueKind::U8, &id),
            order_key(ValueKind::U8, &id, 0),
            position_key(&id, &0u8),
            authority_key(),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_same_id_different_kinds_are_separate() {
        let id = B256::repeat_byte(1);
        assert_ne!(size_key(ValueKind::U8, &id), size_key(ValueKind::I8, &id));
        // Same encoding, different type: still different slots
        assert_ne!(position_key(&id, &1u8), position_key(&id, &1i8));
    }

    #[test]
    fn test_order_keys_embed_index() {
        let id = B256::ZERO;
        let key = order_key(ValueKind::String, &id, 258);
        assert_eq!(key.len(), 2 + 32 + 8);
        assert_eq!(&key[key.len() - 2..], &[1, 2]);
    }

    #[test]
    fn test_position_keys_are_bounded() {
        let id = B256::ZERO;
        let huge = Bytes::from(vec![0xAB; 10_000]);
        assert_eq!(position_key(&id, &huge).len(), MAX_LAYOUT_KEY);
        assert_eq!(position_key(&id, &U256::from(5)).len(), MAX_LAYOUT_KEY);
    }

    #[test]
    fn test_counter_codec() {
        let id = B256::ZERO;
        assert_eq!(decode_u64(ValueKind::U8, &id, &encode_u64(42)).unwrap(), 42);
        assert!(matches!(
            decode_u64(ValueKind::U8, &id, &[1, 2]),
            Err(StorageError::Corrupted { .. })
        ));
    }
}
