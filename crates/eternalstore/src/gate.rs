//! Access gate: the single "latest version" allowed to mutate.

use alloy_primitives::Address;

use crate::error::{StorageError, StorageResult};

/// Holds the current authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessGate {
    authority: Address,
}

impl AccessGate {
    pub const fn new(authority: Address) -> Self {
        Self { authority }
    }

    pub const fn authority(&self) -> Address {
        self.authority
    }

    /// `Ok` iff `caller` is the current authority.
    pub fn authorize(&self, caller: Address) -> StorageResult<()> {
        if caller == self.authority {
            Ok(())
        } else {
            Err(StorageError::Unauthorized { caller, authority: self.authority })
        }
    }

    /// Replace the authority, returning the previous one.
    pub(crate) fn transfer(&mut self, new_authority: Address) -> Address {
        std::mem::replace(&mut self.authority, new_authority)
    }
}

/// Audit events emitted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageEvent {
    VersionUpgraded { previous: Address, new_version: Address },
}
