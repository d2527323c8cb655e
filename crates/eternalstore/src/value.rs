//! Value types the store can hold.
//!
//! Each type has a fixed tag byte (part of every key it lives under), a
//! zero value (what an unset scalar reads as) and a canonical byte encoding
//! (what is stored, and what position keys are hashed from).

use std::fmt;

use alloy_primitives::{Address, Bytes, B128, B256, B64, I256, U256};

use crate::error::{StorageError, StorageResult};

/// Type tag of a stored value.
///
/// Tags are part of the persisted key layout; never renumber them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    Bool = 0x00,
    U8 = 0x01,
    U128 = 0x02,
    U256 = 0x03,
    I8 = 0x04,
    I128 = 0x05,
    I256 = 0x06,
    Address = 0x07,
    Bytes8 = 0x08,
    Bytes16 = 0x09,
    Bytes32 = 0x0A,
    Bytes = 0x0B,
    String = 0x0C,
}

impl ValueKind {
    pub const ALL: [ValueKind; 13] = [
        ValueKind::Bool,
        ValueKind::U8,
        ValueKind::U128,
        ValueKind::U256,
        ValueKind::I8,
        ValueKind::I128,
        ValueKind::I256,
        ValueKind::Address,
        ValueKind::Bytes8,
        ValueKind::Bytes16,
        ValueKind::Bytes32,
        ValueKind::Bytes,
        ValueKind::String,
    ];

    pub const fn tag(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::U8 => "uint8",
            ValueKind::U128 => "uint128",
            ValueKind::U256 => "uint256",
            ValueKind::I8 => "int8",
            ValueKind::I128 => "int128",
            ValueKind::I256 => "int256",
            ValueKind::Address => "address",
            ValueKind::Bytes8 => "bytes8",
            ValueKind::Bytes16 => "bytes16",
            ValueKind::Bytes32 => "bytes32",
            ValueKind::Bytes => "bytes",
            ValueKind::String => "string",
        }
    }

    /// Encoded width, `None` for variable-length kinds.
    pub const fn width(self) -> Option<usize> {
        match self {
            ValueKind::Bool | ValueKind::U8 | ValueKind::I8 => Some(1),
            ValueKind::Bytes8 => Some(8),
            ValueKind::U128 | ValueKind::I128 | ValueKind::Bytes16 => Some(16),
            ValueKind::Address => Some(20),
            ValueKind::U256 | ValueKind::I256 | ValueKind::Bytes32 => Some(32),
            ValueKind::Bytes | ValueKind::String => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A type that can be stored as a scalar or as a list member.
///
/// Equality of values is equality of their encodings.
pub trait StorageValue: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    const KIND: ValueKind;

    /// What an absent entry reads as.
    fn zero() -> Self;

    fn encode(&self) -> Vec<u8>;

    fn decode(bytes: &[u8]) -> StorageResult<Self>;
}

fn fixed<const N: usize>(kind: ValueKind, bytes: &[u8]) -> StorageResult<[u8; N]> {
    bytes.try_into().map_err(|_| StorageError::Decode {
        kind,
        reason: format!("expected {} bytes, got {}", N, bytes.len()),
    })
}

macro_rules! impl_primitive_int {
    ($($ty:ty => $kind:ident, $width:literal;)*) => {$(
        impl StorageValue for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn zero() -> Self {
                0
            }

            fn encode(&self) -> Vec<u8> {
                self.to_be_bytes().to_vec()
            }

            fn decode(bytes: &[u8]) -> StorageResult<Self> {
                fixed::<$width>(Self::KIND, bytes).map(<$ty>::from_be_bytes)
            }
        }
    )*};
}

impl_primitive_int! {
    u8 => U8, 1;
    u128 => U128, 16;
    i8 => I8, 1;
    i128 => I128, 16;
}

impl StorageValue for U256 {
    const KIND: ValueKind = ValueKind::U256;

    fn zero() -> Self {
        U256::ZERO
    }

    fn encode(&self) -> Vec<u8> {
        self.to_be_bytes::<32>().to_vec()
    }

    fn decode(bytes: &[u8]) -> StorageResult<Self> {
        fixed::<32>(Self::KIND, bytes).map(U256::from_be_bytes)
    }
}

/// Two's complement, big-endian.
impl StorageValue for I256 {
    const KIND: ValueKind = ValueKind::I256;

    fn zero() -> Self {
        I256::ZERO
    }

    fn encode(&self) -> Vec<u8> {
        self.into_raw().to_be_bytes::<32>().to_vec()
    }

    fn decode(bytes: &[u8]) -> StorageResult<Self> {
        fixed::<32>(Self::KIND, bytes).map(|raw| I256::from_raw(U256::from_be_bytes(raw)))
    }
}

impl StorageValue for Address {
    const KIND: ValueKind = ValueKind::Address;

    fn zero() -> Self {
        Address::ZERO
    }

    fn encode(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }

    fn decode(bytes: &[u8]) -> StorageResult<Self> {
        fixed::<20>(Self::KIND, bytes).map(Address::from)
    }
}

macro_rules! impl_fixed_bytes {
    ($($ty:ty => $kind:ident, $width:literal;)*) => {$(
        impl StorageValue for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn zero() -> Self {
                <$ty>::ZERO
            }

            fn encode(&self) -> Vec<u8> {
                self.as_slice().to_vec()
            }

            fn decode(bytes: &[u8]) -> StorageResult<Self> {
                fixed::<$width>(Self::KIND, bytes).map(<$ty>::from)
            }
        }
    )*};
}

impl_fixed_bytes! {
    B64 => Bytes8, 8;
    B128 => Bytes16, 16;
    B256 => Bytes32, 32;
}

impl StorageValue for Bytes {
    const KIND: ValueKind = ValueKind::Bytes;

    fn zero() -> Self {
        Bytes::new()
    }

    fn encode(&self) -> Vec<u8> {
        self.to_vec()
    }

    fn decode(bytes: &[u8]) -> StorageResult<Self> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

impl StorageValue for String {
    const KIND: ValueKind = ValueKind::String;

    fn zero() -> Self {
        String::new()
    }

    fn encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> StorageResult<Self> {
        String::from_utf8(bytes.to_vec()).map_err(|e| StorageError::Decode {
            kind: Self::KIND,
            reason: e.to_string(),
        })
    }
}

impl StorageValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn zero() -> Self {
        false
    }

    fn encode(&self) -> Vec<u8> {
        vec![u8::from(*self)]
    }

    fn decode(bytes: &[u8]) -> StorageResult<Self> {
        match bytes {
            [0] => Ok(false),
            [1] => Ok(true),
            other => Err(StorageError::Decode {
                kind: Self::KIND,
                reason: format!("invalid bool encoding {:?}", other),
            }),
        }
    }
}
