//! Indexed sets: iterable lists of unique values.
//!
//! A list is three kinds of entries in the engine (see `keys`):
//! - `size`: number of members, absent when the list is empty
//! - `order[i]`: the member at position `i`, for `i < size`
//! - `position[v]`: `i + 1` for the member `v` at position `i`
//!
//! Membership, insert and removal are O(1). Removal swaps the last member
//! into the vacated slot, so **iteration order is not stable across
//! removals**; callers must not rely on it.

use std::marker::PhantomData;

use alloy_primitives::{Address, B256};
use tracing::debug;

use eternalstore_core::Backend;

use crate::error::{StorageError, StorageResult};
use crate::keys::{decode_u64, encode_u64, order_key, position_key, size_key};
use crate::store::EternalStorage;
use crate::tx::{ReadView, WriteTx};
use crate::value::StorageValue;

pub(crate) fn size<T: StorageValue, V: ReadView + ?Sized>(
    view: &V,
    list_id: &B256,
) -> StorageResult<u64> {
    match view.read(&size_key(T::KIND, list_id))? {
        Some(bytes) => decode_u64(T::KIND, list_id, &bytes),
        None => Ok(0),
    }
}

/// Raw encoding at `order[index]`; the caller has checked `index < size`.
fn slot_bytes<T: StorageValue, V: ReadView + ?Sized>(
    view: &V,
    list_id: &B256,
    index: u64,
) -> StorageResult<Vec<u8>> {
    view.read(&order_key(T::KIND, list_id, index))?.ok_or_else(|| StorageError::Corrupted {
        kind: T::KIND,
        list_id: *list_id,
        reason: format!("order slot {} is empty", index),
    })
}

fn slot<T: StorageValue, V: ReadView + ?Sized>(
    view: &V,
    list_id: &B256,
    index: u64,
) -> StorageResult<T> {
    T::decode(&slot_bytes::<T, V>(view, list_id, index)?)
}

/// Position of `value` if it is a member: `position[value] = p` with
/// `0 < p <= size` and `order[p - 1] == value`.
fn member_index<T: StorageValue, V: ReadView + ?Sized>(
    view: &V,
    list_id: &B256,
    value: &T,
    size: u64,
) -> StorageResult<Option<u64>> {
    let Some(bytes) = view.read(&position_key(list_id, value))? else {
        return Ok(None);
    };
    let position = decode_u64(T::KIND, list_id, &bytes)?;
    if position == 0 || position > size {
        return Ok(None);
    }
    let index = position - 1;
    let stored = view.read(&order_key(T::KIND, list_id, index))?;
    Ok((stored.as_deref() == Some(value.encode().as_slice())).then_some(index))
}

pub(crate) fn contains<T: StorageValue, V: ReadView + ?Sized>(
    view: &V,
    list_id: &B256,
    value: &T,
) -> StorageResult<bool> {
    let size = size::<T, V>(view, list_id)?;
    Ok(member_index(view, list_id, value, size)?.is_some())
}

/// Append `value`; returns the new size.
pub(crate) fn insert<T: StorageValue, B: Backend + ?Sized>(
    tx: &mut WriteTx<'_, B>,
    list_id: &B256,
    value: &T,
) -> StorageResult<u64> {
    let size = size::<T, _>(tx, list_id)?;
    if member_index(tx, list_id, value, size)?.is_some() {
        return Err(StorageError::DuplicateValue { kind: T::KIND, list_id: *list_id });
    }

    tx.put(order_key(T::KIND, list_id, size), value.encode());
    tx.put(position_key(list_id, value), encode_u64(size + 1));
    tx.put(size_key(T::KIND, list_id), encode_u64(size + 1));
    Ok(size + 1)
}

/// Swap-and-pop removal of `value`; returns the new size.
pub(crate) fn remove<T: StorageValue, B: Backend + ?Sized>(
    tx: &mut WriteTx<'_, B>,
    list_id: &B256,
    value: &T,
) -> StorageResult<u64> {
    let size = size::<T, _>(tx, list_id)?;
    let index = member_index(tx, list_id, value, size)?
        .ok_or(StorageError::NotFound { kind: T::KIND, list_id: *list_id })?;
    let last = size - 1;

    if index != last {
        let last_bytes = slot_bytes::<T, _>(tx, list_id, last)?;
        let last_value = T::decode(&last_bytes)?;
        tx.put(position_key(list_id, &last_value), encode_u64(index + 1));
        tx.put(order_key(T::KIND, list_id, index), last_bytes);
    }

    tx.delete(position_key(list_id, value));
    tx.delete(order_key(T::KIND, list_id, last));
    // An emptied list leaves no entries behind.
    if last == 0 {
        tx.delete(size_key(T::KIND, list_id));
    } else {
        tx.put(size_key(T::KIND, list_id), encode_u64(last));
    }
    Ok(last)
}

pub(crate) fn all<T: StorageValue, V: ReadView + ?Sized>(
    view: &V,
    list_id: &B256,
) -> StorageResult<Vec<T>> {
    let size = size::<T, V>(view, list_id)?;
    (0..size).map(|i| slot::<T, V>(view, list_id, i)).collect()
}

pub(crate) fn at<T: StorageValue, V: ReadView + ?Sized>(
    view: &V,
    list_id: &B256,
    index: u64,
) -> StorageResult<T> {
    let size = size::<T, V>(view, list_id)?;
    if index >= size {
        return Err(StorageError::IndexOutOfRange { kind: T::KIND, list_id: *list_id, index, size });
    }
    slot::<T, V>(view, list_id, index)
}

/// `order[offset .. min(offset + limit, size))`. Fails when `offset >= size`,
/// which includes every offset on an empty list.
pub(crate) fn range<T: StorageValue, V: ReadView + ?Sized>(
    view: &V,
    list_id: &B256,
    offset: u64,
    limit: u64,
) -> StorageResult<Vec<T>> {
    let size = size::<T, V>(view, list_id)?;
    if offset >= size {
        return Err(StorageError::OffsetOutOfRange {
            kind: T::KIND,
            list_id: *list_id,
            offset,
            size,
        });
    }
    let end = offset.saturating_add(limit).min(size);
    (offset..end).map(|i| slot::<T, V>(view, list_id, i)).collect()
}

/// Handle on one `(T, list_id)` list of a store.
///
/// | Method        | Facade equivalent          |
/// |---------------|----------------------------|
/// | `add()`       | `add_{t}_key()`            |
/// | `remove()`    | `remove_{t}_key()`         |
/// | `contains()`  | `exists_{t}_key()`         |
/// | `to_vec()`    | `get_{t}_keys()`           |
/// | `range()`     | `get_range_of_{t}_keys()`  |
/// | `get()`       | `get_{t}_key_by_index()`   |
/// | `len()`       | `get_{t}_key_size()`       |
pub struct IndexedSet<'s, B: Backend, T: StorageValue> {
    store: &'s EternalStorage<B>,
    list_id: B256,
    _value: PhantomData<fn() -> T>,
}

impl<'s, B: Backend, T: StorageValue> IndexedSet<'s, B, T> {
    pub(crate) fn new(store: &'s EternalStorage<B>, list_id: B256) -> Self {
        Self { store, list_id, _value: PhantomData }
    }

    pub fn list_id(&self) -> B256 {
        self.list_id
    }

    /// Append `value`. Fails `Unauthorized` or `DuplicateValue`.
    pub fn add(&self, caller: Address, value: T) -> StorageResult<()> {
        let list_id = self.list_id;
        let size = self.store.transact(caller, |tx| insert(tx, &list_id, &value))?;
        debug!(kind = %T::KIND, list_id = %list_id, size, "value added");
        Ok(())
    }

    /// Remove `value`, moving the last member into its slot. Fails
    /// `Unauthorized` or `NotFound`.
    pub fn remove(&self, caller: Address, value: &T) -> StorageResult<()> {
        let list_id = self.list_id;
        let size = self.store.transact(caller, |tx| remove(tx, &list_id, value))?;
        debug!(kind = %T::KIND, list_id = %list_id, size, "value removed");
        Ok(())
    }

    pub fn contains(&self, value: &T) -> StorageResult<bool> {
        self.store.view(|view| contains(view, &self.list_id, value))
    }

    pub fn len(&self) -> StorageResult<u64> {
        self.store.view(|view| size::<T, _>(view, &self.list_id))
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// All members in current storage order.
    pub fn to_vec(&self) -> StorageResult<Vec<T>> {
        self.store.view(|view| all(view, &self.list_id))
    }

    /// Member at `index`. Fails `IndexOutOfRange` if `index >= len`.
    pub fn get(&self, index: u64) -> StorageResult<T> {
        self.store.view(|view| at(view, &self.list_id, index))
    }

    /// Up to `limit` members from `offset`. Fails `OffsetOutOfRange` if
    /// `offset >= len`.
    pub fn range(&self, offset: u64, limit: u64) -> StorageResult<Vec<T>> {
        self.store.view(|view| range(view, &self.list_id, offset, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;
    use eternalstore_core::MemoryBackend;

    const A: Address = Address::repeat_byte(0xaa);
    const C: Address = Address::repeat_byte(0xcc);

    fn store() -> EternalStorage<MemoryBackend> {
        EternalStorage::in_memory(A).unwrap()
    }

    fn sorted<T: Ord>(mut v: Vec<T>) -> Vec<T> {
        v.sort();
        v
    }

    #[test]
    fn test_swap_pop_scenario() {
        let store = store();
        let list = store.list::<u8>(B256::repeat_byte(1));
        for v in [5u8, 9, 2] {
            list.add(A, v).unwrap();
        }
        assert_eq!(list.len().unwrap(), 3);
        assert_eq!(list.get(0).unwrap(), 5);

        list.remove(A, &9).unwrap();
        assert_eq!(list.len().unwrap(), 2);
        assert_eq!(list.get(1).unwrap(), 2);
        assert_eq!(sorted(list.to_vec().unwrap()), vec![2, 5]);

        list.remove(A, &2).unwrap();
        list.remove(A, &5).unwrap();
        assert_eq!(list.len().unwrap(), 0);
        assert!(matches!(
            list.range(0, 1),
            Err(StorageError::OffsetOutOfRange { offset: 0, size: 0, .. })
        ));
    }

    #[test]
    fn test_duplicate_rejected_without_effect() {
        let store = store();
        let list = store.list::<u8>(B256::ZERO);
        list.add(A, 1).unwrap();
        assert!(matches!(list.add(A, 1), Err(StorageError::DuplicateValue { .. })));
        assert_eq!(list.len().unwrap(), 1);
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let store = store();
        let list = store.list::<u8>(B256::ZERO);
        assert!(matches!(list.remove(A, &1), Err(StorageError::NotFound { .. })));
        list.add(A, 1).unwrap();
        assert!(matches!(list.remove(A, &2), Err(StorageError::NotFound { .. })));
        assert_eq!(list.len().unwrap(), 1);
    }

    #[test]
    fn test_remove_last_keeps_order_of_rest() {
        let store = store();
        let list = store.list::<u8>(B256::ZERO);
        for v in [10u8, 20, 30] {
            list.add(A, v).unwrap();
        }
        list.remove(A, &30).unwrap();
        assert_eq!(list.to_vec().unwrap(), vec![10, 20]);
    }

    #[test]
    fn test_unauthorized_mutations_change_nothing() {
        let store = store();
        let list = store.list::<u8>(B256::ZERO);
        list.add(A, 1).unwrap();

        assert!(matches!(list.add(C, 2), Err(StorageError::Unauthorized { .. })));
        assert!(matches!(list.remove(C, &1), Err(StorageError::Unauthorized { .. })));
        assert_eq!(list.to_vec().unwrap(), vec![1]);
    }

    #[test]
    fn test_index_bounds() {
        let store = store();
        let list = store.list::<u8>(B256::ZERO);
        assert!(matches!(
            list.get(0),
            Err(StorageError::IndexOutOfRange { index: 0, size: 0, .. })
        ));
        list.add(A, 7).unwrap();
        assert_eq!(list.get(0).unwrap(), 7);
        assert!(matches!(
            list.get(1),
            Err(StorageError::IndexOutOfRange { index: 1, size: 1, .. })
        ));
    }

    #[test]
    fn test_range_clamps_and_zero_limit() {
        let store = store();
        let list = store.list::<u8>(B256::ZERO);
        for v in 0u8..5 {
            list.add(A, v).unwrap();
        }
        assert_eq!(list.range(3, 10).unwrap(), vec![3, 4]);
        assert_eq!(list.range(1, 2).unwrap(), vec![1, 2]);
        assert!(list.range(4, 0).unwrap().is_empty());
        assert_eq!(list.range(0, u64::MAX).unwrap().len(), 5);
        assert!(list.range(5, 1).is_err());
    }

    #[test]
    fn test_emptied_list_leaves_no_entries() {
        let store = store();
        let list = store.list::<Bytes>(B256::repeat_byte(3));
        list.add(A, Bytes::from_static(b"one")).unwrap();
        list.add(A, Bytes::from_static(b"two")).unwrap();
        list.remove(A, &Bytes::from_static(b"one")).unwrap();
        list.remove(A, &Bytes::from_static(b"two")).unwrap();

        // Only the persisted authority remains
        assert_eq!(store.stored_entries(), 1);
        assert!(!list.contains(&Bytes::from_static(b"one")).unwrap());
    }

    #[test]
    fn test_readd_after_remove() {
        let store = store();
        let list = store.list::<String>(B256::ZERO);
        list.add(A, "x".into()).unwrap();
        list.add(A, "y".into()).unwrap();
        list.remove(A, &"x".to_string()).unwrap();
        list.add(A, "x".into()).unwrap();

        assert_eq!(list.to_vec().unwrap(), vec!["y".to_string(), "x".to_string()]);
        assert!(list.contains(&"x".to_string()).unwrap());
    }

    #[test]
    fn test_lists_are_independent() {
        let store = store();
        let a = store.list::<u8>(B256::repeat_byte(1));
        let b = store.list::<u8>(B256::repeat_byte(2));
        let signed = store.list::<i8>(B256::repeat_byte(1));

        a.add(A, 1).unwrap();
        b.add(A, 1).unwrap();
        signed.add(A, 1).unwrap();
        a.remove(A, &1).unwrap();

        assert!(!a.contains(&1).unwrap());
        assert!(b.contains(&1).unwrap());
        assert!(signed.contains(&1).unwrap());
    }

    #[test]
    fn test_stale_position_is_not_membership() {
        let store = store();
        let list = store.list::<u8>(B256::ZERO);
        list.add(A, 1).unwrap();

        // A position entry pointing past the end, as an older layout might leave
        let mut tx = WriteTx::new(store.backend());
        tx.put(position_key(&B256::ZERO, &9u8), encode_u64(5));
        tx.commit().unwrap();

        assert!(!list.contains(&9).unwrap());
        list.add(A, 9).unwrap();
        assert_eq!(list.to_vec().unwrap(), vec![1, 9]);
    }
}
