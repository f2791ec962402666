use core::ops::Bound;
use std::collections::BTreeMap;

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_trie::TrieAccount;

use super::AccountInfo;
use crate::{root::sorted_trie_root, transition::LegacySource};

/// A storage slot of the legacy layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacySlot {
    /// Hash of the slot key.
    pub hash: B256,
    /// Slot key.
    pub key: U256,
    /// Slot value, never zero.
    pub value: U256,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct LegacyAccount {
    address: Address,
    header: Option<AccountInfo>,
    storage: BTreeMap<B256, (U256, U256)>,
}

impl LegacyAccount {
    fn is_vacant(&self) -> bool {
        self.header.is_none() && self.storage.is_empty()
    }
}

/// The legacy layout: a Merkle-Patricia trie of accounts keyed by address hash, each with its
/// own storage trie keyed by slot hash.
///
/// Once the new layout is active, entries are only ever removed from here: either because they
/// were migrated or because execution wrote a fresher value to the new layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyStore {
    accounts: BTreeMap<B256, LegacyAccount>,
}

impl LegacyStore {
    /// Returns the header of `address`.
    pub fn account(&self, address: Address) -> Option<AccountInfo> {
        self.accounts.get(&keccak256(address)).and_then(|account| account.header)
    }

    /// Returns the value of `slot` of `address`, `None` if unset.
    pub fn storage(&self, address: Address, slot: U256) -> Option<U256> {
        self.accounts
            .get(&keccak256(address))?
            .storage
            .get(&keccak256(B256::from(slot)))
            .map(|(_, value)| *value)
    }

    /// Iterates over the accounts with a header.
    pub fn addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.accounts.values().filter(|account| account.header.is_some()).map(|a| a.address)
    }

    /// Iterates over every address with a header or storage.
    pub fn all_addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.accounts.values().map(|account| account.address)
    }

    /// Iterates over the storage of `address`.
    pub fn storage_slots(&self, address: Address) -> impl Iterator<Item = (U256, U256)> + '_ {
        self.accounts
            .get(&keccak256(address))
            .into_iter()
            .flat_map(|account| account.storage.values().copied())
    }

    /// Sets the header of `address`.
    pub fn set_account(&mut self, address: Address, info: AccountInfo) {
        self.accounts
            .entry(keccak256(address))
            .or_insert_with(|| LegacyAccount { address, ..Default::default() })
            .header = Some(info);
    }

    /// Removes the header of `address`, keeping its storage.
    pub fn remove_account(&mut self, address: Address) {
        self.update(address, |account| account.header = None);
    }

    /// Sets `slot` of `address`. A zero value removes the slot.
    pub fn set_storage(&mut self, address: Address, slot: U256, value: U256) {
        let slot_hash = keccak256(B256::from(slot));
        if value.is_zero() {
            self.remove_storage(address, slot);
            return;
        }
        self.accounts
            .entry(keccak256(address))
            .or_insert_with(|| LegacyAccount { address, ..Default::default() })
            .storage
            .insert(slot_hash, (slot, value));
    }

    /// Removes `slot` of `address`.
    pub fn remove_storage(&mut self, address: Address, slot: U256) {
        let slot_hash = keccak256(B256::from(slot));
        self.update(address, |account| {
            account.storage.remove(&slot_hash);
        });
    }

    /// Removes the whole storage of `address`.
    pub fn clear_storage(&mut self, address: Address) {
        self.update(address, |account| account.storage.clear());
    }

    fn update(&mut self, address: Address, f: impl FnOnce(&mut LegacyAccount)) {
        let address_hash = keccak256(address);
        if let Some(account) = self.accounts.get_mut(&address_hash) {
            f(account);
            if account.is_vacant() {
                self.accounts.remove(&address_hash);
            }
        }
    }

    /// Computes the state root. Storage of accounts without a header does not contribute.
    pub fn root(&self) -> B256 {
        let leaves = self.accounts.iter().filter_map(|(address_hash, account)| {
            let info = account.header?;
            let storage_root = sorted_trie_root(
                account.storage.iter().map(|(slot_hash, (_, value))| (slot_hash, alloy_rlp::encode(value))),
            );
            let account = TrieAccount {
                nonce: info.nonce,
                balance: info.balance,
                storage_root,
                code_hash: info.code_hash,
            };
            Some((address_hash, alloy_rlp::encode(account)))
        });
        sorted_trie_root(leaves)
    }
}

impl LegacySource for LegacyStore {
    fn next_account(&self, from: Bound<B256>) -> Option<Address> {
        self.accounts.range((from, Bound::Unbounded)).next().map(|(_, account)| account.address)
    }

    fn account_header(&self, address_hash: B256) -> Option<AccountInfo> {
        self.accounts.get(&address_hash).and_then(|account| account.header)
    }

    fn next_slot(&self, address_hash: B256, from: Bound<B256>) -> Option<LegacySlot> {
        let account = self.accounts.get(&address_hash)?;
        account
            .storage
            .range((from, Bound::Unbounded))
            .next()
            .map(|(hash, (key, value))| LegacySlot { hash: *hash, key: *key, value: *value })
    }
}
