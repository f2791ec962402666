use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{keccak256, Address, B256, U256};
use derive_more::{Deref, IntoIterator};

use super::AccountInfo;
use crate::{root::sorted_trie_root, transition::MigrationSink};

/// Leaf index of the nonce within an account stem.
pub const NONCE_LEAF: u8 = 0;
/// Leaf index of the balance within an account stem.
pub const BALANCE_LEAF: u8 = 1;
/// Leaf index of the code hash within an account stem.
pub const CODE_HASH_LEAF: u8 = 2;

/// Returns the key of leaf `leaf` of the header stem of `address`.
pub fn account_leaf_key(address: Address, leaf: u8) -> B256 {
    tree_key(address, U256::ZERO, leaf)
}

/// Returns the keys of every header leaf of `address`.
pub fn account_leaf_keys(address: Address) -> [B256; 3] {
    [NONCE_LEAF, BALANCE_LEAF, CODE_HASH_LEAF].map(|leaf| account_leaf_key(address, leaf))
}

/// Returns the key of storage slot `slot` of `address`. Slots are grouped 256 to a stem, the
/// low byte of the slot selecting the leaf.
pub fn storage_leaf_key(address: Address, slot: U256) -> B256 {
    let [.., low] = slot.to_be_bytes::<32>();
    tree_key(address, (slot >> 8) + U256::from(1), low)
}

fn tree_key(address: Address, stem_index: U256, leaf: u8) -> B256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(address.into_word().as_slice());
    preimage[32..].copy_from_slice(&stem_index.to_be_bytes::<32>());
    let mut key = keccak256(preimage);
    key[31] = leaf;
    key
}

/// The new storage layout: a flat map of 32-byte leaves, committed to by a single trie.
///
/// Alongside the leaves the tree indexes which accounts and slots it holds, so the state can be
/// enumerated by address. Leaves inserted with [`StemTree::insert_raw`] are not indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, IntoIterator)]
pub struct StemTree {
    #[deref]
    #[into_iterator(owned, ref)]
    leaves: BTreeMap<B256, B256>,
    accounts: BTreeSet<Address>,
    slots: BTreeMap<Address, BTreeSet<U256>>,
}

impl StemTree {
    /// Creates a tree from raw leaves. Their keys are hashes, so none of them are indexed.
    pub fn from_leaves(leaves: BTreeMap<B256, B256>) -> Self {
        Self { leaves, ..Default::default() }
    }

    /// Inserts a raw leaf.
    pub fn insert_raw(&mut self, key: B256, value: B256) {
        self.leaves.insert(key, value);
    }

    /// Returns the header of `address`. An account exists iff its code hash leaf is set.
    pub fn account(&self, address: Address) -> Option<AccountInfo> {
        let code_hash = *self.leaves.get(&account_leaf_key(address, CODE_HASH_LEAF))?;
        let word = |leaf| {
            self.leaves.get(&account_leaf_key(address, leaf)).map_or(U256::ZERO, |v| (*v).into())
        };
        Some(AccountInfo { nonce: word(NONCE_LEAF).saturating_to(), balance: word(BALANCE_LEAF), code_hash })
    }

    /// Writes the header of `address`.
    pub fn set_account(&mut self, address: Address, info: AccountInfo) {
        let [nonce, balance, code_hash] = account_leaf_keys(address);
        self.leaves.insert(nonce, U256::from(info.nonce).into());
        self.leaves.insert(balance, info.balance.into());
        self.leaves.insert(code_hash, info.code_hash);
        self.accounts.insert(address);
    }

    /// Removes the header of `address`.
    pub fn remove_account(&mut self, address: Address) {
        for key in account_leaf_keys(address) {
            self.leaves.remove(&key);
        }
        self.accounts.remove(&address);
    }

    /// Returns the value of `slot` of `address`, `None` if unset.
    pub fn storage(&self, address: Address, slot: U256) -> Option<U256> {
        self.leaves.get(&storage_leaf_key(address, slot)).map(|value| (*value).into())
    }

    /// Sets `slot` of `address`. A zero value removes the leaf.
    pub fn set_storage(&mut self, address: Address, slot: U256, value: U256) {
        let key = storage_leaf_key(address, slot);
        if value.is_zero() {
            self.leaves.remove(&key);
            if let Some(slots) = self.slots.get_mut(&address) {
                slots.remove(&slot);
            }
        } else {
            self.leaves.insert(key, value.into());
            self.slots.entry(address).or_default().insert(slot);
        }
    }

    /// Removes every indexed slot of `address`.
    pub fn clear_storage(&mut self, address: Address) {
        for slot in self.slots.remove(&address).unwrap_or_default() {
            self.leaves.remove(&storage_leaf_key(address, slot));
        }
    }

    /// Iterates over the indexed accounts.
    pub fn addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.accounts.iter().copied()
    }

    /// Iterates over the indexed slots of `address` and their values.
    pub fn storage_slots(&self, address: Address) -> impl Iterator<Item = (U256, U256)> + '_ {
        self.slots
            .get(&address)
            .into_iter()
            .flatten()
            .filter_map(move |slot| Some((*slot, self.storage(address, *slot)?)))
    }

    /// Computes the root committing to every leaf.
    pub fn root(&self) -> B256 {
        sorted_trie_root(self.leaves.iter())
    }
}

impl MigrationSink for StemTree {
    fn migrate_slot(&mut self, address: Address, slot: U256, value: U256) {
        if !self.leaves.contains_key(&storage_leaf_key(address, slot)) {
            self.set_storage(address, slot, value);
        }
    }

    fn migrate_account(&mut self, address: Address, info: AccountInfo) {
        if self.account(address).is_none() {
            self.set_account(address, info);
        }
    }
}
