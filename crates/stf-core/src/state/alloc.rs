use std::collections::BTreeMap;

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// An account of a genesis-style allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocAccount {
    /// Deployed code.
    #[serde(default, skip_serializing_if = "<[u8]>::is_empty")]
    pub code: Bytes,
    /// Non-zero storage slots.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub storage: BTreeMap<U256, U256>,
    /// Balance in wei.
    #[serde(default)]
    pub balance: U256,
    /// Account nonce.
    #[serde(default, with = "alloy_serde::quantity", skip_serializing_if = "is_zero")]
    pub nonce: u64,
}

impl AllocAccount {
    /// Creates an account holding `balance`.
    pub fn with_balance(balance: U256) -> Self {
        Self { balance, ..Default::default() }
    }

    /// Sets the nonce.
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the code.
    pub fn code(mut self, code: impl Into<Bytes>) -> Self {
        self.code = code.into();
        self
    }

    /// Sets a storage slot.
    pub fn slot(mut self, slot: U256, value: U256) -> Self {
        self.storage.insert(slot, value);
        self
    }
}

/// Accounts by address.
pub type Alloc = BTreeMap<Address, AllocAccount>;

const fn is_zero(value: &u64) -> bool {
    *value == 0
}
