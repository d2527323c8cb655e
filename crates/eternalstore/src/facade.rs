//! Per-type named operations.
//!
//! Thin wrappers over [`IndexedSet`](crate::IndexedSet) and the generic
//! scalar accessors, one family per value type, e.g. `add_u8_key`,
//! `get_range_of_string_keys`, `set_address`.

use alloy_primitives::{Address, Bytes, B128, B256, B64, I256, U256};

use eternalstore_core::Backend;

use crate::error::StorageResult;
use crate::store::EternalStorage;

macro_rules! list_facade {
    ($(
        $ty:ty => $add:ident, $remove:ident, $exists:ident, $all:ident,
                  $range:ident, $by_index:ident, $size:ident;
    )*) => {
        impl<B: Backend> EternalStorage<B> {$(
            #[doc = concat!("Add a `", stringify!($ty), "` to `list_id`.")]
            pub fn $add(&self, caller: Address, list_id: B256, value: $ty) -> StorageResult<()> {
                self.list::<$ty>(list_id).add(caller, value)
            }

            pub fn $remove(
                &self,
                caller: Address,
                list_id: B256,
                value: &$ty,
            ) -> StorageResult<()> {
                self.list::<$ty>(list_id).remove(caller, value)
            }

            pub fn $exists(&self, list_id: B256, value: &$ty) -> StorageResult<bool> {
                self.list::<$ty>(list_id).contains(value)
            }

            pub fn $all(&self, list_id: B256) -> StorageResult<Vec<$ty>> {
                self.list::<$ty>(list_id).to_vec()
            }

            pub fn $range(
                &self,
                list_id: B256,
                offset: u64,
                limit: u64,
            ) -> StorageResult<Vec<$ty>> {
                self.list::<$ty>(list_id).range(offset, limit)
            }

            pub fn $by_index(&self, list_id: B256, index: u64) -> StorageResult<$ty> {
                self.list::<$ty>(list_id).get(index)
            }

            pub fn $size(&self, list_id: B256) -> StorageResult<u64> {
                self.list::<$ty>(list_id).len()
            }
        )*}
    };
}

macro_rules! scalar_facade {
    ($($ty:ty => $get:ident, $set:ident, $delete:ident;)*) => {
        impl<B: Backend> EternalStorage<B> {$(
            pub fn $get(&self, key: B256) -> StorageResult<$ty> {
                self.get_value::<$ty>(key)
            }

            pub fn $set(&self, caller: Address, key: B256, value: $ty) -> StorageResult<()> {
                self.set_value::<$ty>(caller, key, value)
            }

            pub fn $delete(&self, caller: Address, key: B256) -> StorageResult<()> {
                self.delete_value::<$ty>(caller, key)
            }
        )*}
    };
}

list_facade! {
    u8 => add_u8_key, remove_u8_key, exists_u8_key, get_u8_keys,
          get_range_of_u8_keys, get_u8_key_by_index, get_u8_key_size;
    u128 => add_u128_key, remove_u128_key, exists_u128_key, get_u128_keys,
            get_range_of_u128_keys, get_u128_key_by_index, get_u128_key_size;
    U256 => add_u256_key, remove_u256_key, exists_u256_key, get_u256_keys,
            get_range_of_u256_keys, get_u256_key_by_index, get_u256_key_size;
    i8 => add_i8_key, remove_i8_key, exists_i8_key, get_i8_keys,
          get_range_of_i8_keys, get_i8_key_by_index, get_i8_key_size;
    i128 => add_i128_key, remove_i128_key, exists_i128_key, get_i128_keys,
            get_range_of_i128_keys, get_i128_key_by_index, get_i128_key_size;
    I256 => add_i256_key, remove_i256_key, exists_i256_key, get_i256_keys,
            get_range_of_i256_keys, get_i256_key_by_index, get_i256_key_size;
    Address => add_address_key, remove_address_key, exists_address_key, get_address_keys,
               get_range_of_address_keys, get_address_key_by_index, get_address_key_size;
    B64 => add_bytes8_key, remove_bytes8_key, exists_bytes8_key, get_bytes8_keys,
           get_range_of_bytes8_keys, get_bytes8_key_by_index, get_bytes8_key_size;
    B128 => add_bytes16_key, remove_bytes16_key, exists_bytes16_key, get_bytes16_keys,
            get_range_of_bytes16_keys, get_bytes16_key_by_index, get_bytes16_key_size;
    B256 => add_bytes32_key, remove_bytes32_key, exists_bytes32_key, get_bytes32_keys,
            get_range_of_bytes32_keys, get_bytes32_key_by_index, get_bytes32_key_size;
    Bytes => add_bytes_key, remove_bytes_key, exists_bytes_key, get_bytes_keys,
             get_range_of_bytes_keys, get_bytes_key_by_index, get_bytes_key_size;
    String => add_string_key, remove_string_key, exists_string_key, get_string_keys,
              get_range_of_string_keys, get_string_key_by_index, get_string_key_size;
}

scalar_facade! {
    bool => get_bool, set_bool, delete_bool;
    u8 => get_u8, set_u8, delete_u8;
    u128 => get_u128, set_u128, delete_u128;
    U256 => get_u256, set_u256, delete_u256;
    i8 => get_i8, set_i8, delete_i8;
    i128 => get_i128, set_i128, delete_i128;
    I256 => get_i256, set_i256, delete_i256;
    Address => get_address, set_address, delete_address;
    B64 => get_bytes8, set_bytes8, delete_bytes8;
    B128 => get_bytes16, set_bytes16, delete_bytes16;
    B256 => get_bytes32, set_bytes32, delete_bytes32;
    Bytes => get_bytes, set_bytes, delete_bytes;
    String => get_string, set_string, delete_string;
}
