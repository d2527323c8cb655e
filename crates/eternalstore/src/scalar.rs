//! Single-value entries: one value of one type per key.

use alloy_primitives::{Address, B256};
use tracing::debug;

use eternalstore_core::Backend;

use crate::error::StorageResult;
use crate::keys::scalar_key;
use crate::store::EternalStorage;
use crate::tx::ReadView;
use crate::value::StorageValue;

pub(crate) fn read<T: StorageValue, V: ReadView + ?Sized>(
    view: &V,
    key: &B256,
) -> StorageResult<Option<T>> {
    view.read(&scalar_key(T::KIND, key))?.map(|bytes| T::decode(&bytes)).transpose()
}

impl<B: Backend> EternalStorage<B> {
    /// Value at `key`, or the type's zero value if it was never set.
    pub fn get_value<T: StorageValue>(&self, key: B256) -> StorageResult<T> {
        Ok(self.get_value_opt(key)?.unwrap_or_else(T::zero))
    }

    /// Value at `key`; `None` if it was never set or was deleted.
    pub fn get_value_opt<T: StorageValue>(&self, key: B256) -> StorageResult<Option<T>> {
        self.view(|view| read(view, &key))
    }

    pub fn set_value<T: StorageValue>(
        &self,
        caller: Address,
        key: B256,
        value: T,
    ) -> StorageResult<()> {
        self.transact(caller, |tx| {
            tx.put(scalar_key(T::KIND, &key), value.encode());
            Ok(())
        })?;
        debug!(kind = %T::KIND, key = %key, "scalar set");
        Ok(())
    }

    /// Remove the entry at `key`; later reads see the zero value.
    pub fn delete_value<T: StorageValue>(&self, caller: Address, key: B256) -> StorageResult<()> {
        self.transact(caller, |tx| {
            tx.delete(scalar_key(T::KIND, &key));
            Ok(())
        })?;
        debug!(kind = %T::KIND, key = %key, "scalar deleted");
        Ok(())
    }
}
