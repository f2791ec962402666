//! In-memory state with a journal, both storage layouts and transparent reads during the
//! format conversion.

mod alloc;
mod journal;
mod legacy;
mod tree;

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{
    keccak256,
    map::{HashMap, HashSet},
    Address, BlockNumber, Bytes, Log, TxHash, B256, U256,
};
use alloy_trie::KECCAK_EMPTY;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use alloc::{Alloc, AllocAccount};
pub use legacy::{LegacySlot, LegacyStore};
pub use tree::{
    account_leaf_key, account_leaf_keys, storage_leaf_key, StemTree, BALANCE_LEAF, CODE_HASH_LEAF,
    NONCE_LEAF,
};

use journal::{Journal, JournalEntry};

use crate::{
    error::{StateError, TransitionError},
    interfaces::{SnapshotId, StateDb},
    transition::{MigrationProgress, TransitionStatus, TransitionTracker},
};

/// Account header: everything about an account except its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    /// Nonce.
    #[serde(with = "alloy_serde::quantity")]
    pub nonce: u64,
    /// Balance in wei.
    pub balance: U256,
    /// Hash of the code.
    pub code_hash: B256,
}

impl Default for AccountInfo {
    fn default() -> Self {
        Self { nonce: 0, balance: U256::ZERO, code_hash: KECCAK_EMPTY }
    }
}

impl AccountInfo {
    /// Returns `true` if the account has no nonce, no balance and no code (EIP-161).
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code_hash == KECCAK_EMPTY
    }
}

/// Pre-state of a block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreState {
    /// Accounts of the legacy layout.
    pub alloc: Alloc,
    /// Raw leaves of the new layout.
    pub tree_leaves: Option<BTreeMap<B256, B256>>,
    /// Whether the new layout is active for the block.
    pub stateless: bool,
    /// Persisted progress of the format conversion.
    pub transition: TransitionStatus,
}

#[derive(Debug, Clone)]
struct CachedAccount {
    original: Option<AccountInfo>,
    info: AccountInfo,
    exists: bool,
    original_storage: HashMap<U256, U256>,
    storage: HashMap<U256, U256>,
    storage_cleared: bool,
}

impl CachedAccount {
    fn new(original: Option<AccountInfo>) -> Self {
        Self {
            original,
            info: original.unwrap_or_default(),
            exists: original.is_some(),
            original_storage: HashMap::default(),
            storage: HashMap::default(),
            storage_cleared: false,
        }
    }

    fn current(&self) -> Option<AccountInfo> {
        self.exists.then_some(self.info)
    }
}

#[derive(Debug, Clone, Default)]
struct Backend {
    legacy: LegacyStore,
    tree: Option<StemTree>,
}

impl Backend {
    fn root(&self) -> B256 {
        match &self.tree {
            Some(tree) => tree.root(),
            None => self.legacy.root(),
        }
    }

    /// Writes the changes of a cached account. With the new layout active every write goes to
    /// the tree and supersedes whatever the legacy layout holds for the same key.
    fn apply(&mut self, address: Address, account: &CachedAccount) {
        if account.storage_cleared {
            self.legacy.clear_storage(address);
            if let Some(tree) = &mut self.tree {
                tree.clear_storage(address);
            }
        }

        let current = account.current();
        if current != account.original || account.storage_cleared {
            match (&mut self.tree, current) {
                (Some(tree), Some(info)) => {
                    tree.set_account(address, info);
                    self.legacy.remove_account(address);
                }
                (Some(tree), None) => {
                    tree.remove_account(address);
                    self.legacy.remove_account(address);
                }
                (None, Some(info)) => self.legacy.set_account(address, info),
                (None, None) => self.legacy.remove_account(address),
            }
        }

        for (slot, value) in &account.storage {
            if !account.storage_cleared && account.original_storage.get(slot) == Some(value) {
                continue;
            }
            match &mut self.tree {
                Some(tree) => {
                    tree.set_storage(address, *slot, *value);
                    self.legacy.remove_storage(address, *slot);
                }
                None => self.legacy.set_storage(address, *slot, *value),
            }
        }
    }
}

/// Reference implementation of [`StateDb`] holding everything in memory.
///
/// Changes are kept in a per-account cache until [`StateDb::commit`] writes them to the backing
/// layouts. Before the new layout is active only the legacy layout exists. Once it is, reads go
/// to the new layout first and fall back to the legacy layout for keys the conversion has not
/// reached, and every key read from the backing store is recorded for the block witness.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    backend: Backend,
    codes: HashMap<B256, Bytes>,
    transition: TransitionTracker,
    accounts: HashMap<Address, CachedAccount>,
    journal: Journal,
    touched: HashSet<Address>,
    logs: Vec<(TxHash, Log)>,
    tx_hash: TxHash,
    tx_index: usize,
    witness: BTreeSet<B256>,
}

impl MemoryState {
    /// Creates a legacy-layout state holding `alloc`.
    pub fn new(alloc: &Alloc) -> Self {
        let mut state = Self::default();
        for (address, account) in alloc {
            state.insert_account(*address, account);
        }
        state
    }

    /// Builds the state a block executes on.
    ///
    /// When the new layout is active, the legacy accounts are left in place for the conversion
    /// to pick up and the conversion is started if it has not been yet.
    pub fn from_pre_state(pre: PreState) -> Result<Self, StateError> {
        let mut state = Self::new(&pre.alloc);
        state.transition = TransitionTracker::new(pre.transition);
        if pre.stateless {
            // Raw leaves are keyed by hashes, so accounts and slots that exist only in them are
            // served by reads and kept in the root but cannot be listed by `dump`. They reach
            // the output through the tree leaves instead.
            state.backend.tree = Some(pre.tree_leaves.map(StemTree::from_leaves).unwrap_or_default());
            state.transition.start();
        } else if pre.tree_leaves.is_some_and(|leaves| !leaves.is_empty()) {
            return Err(StateError::UnexpectedTreeLeaves);
        }
        Ok(state)
    }

    fn insert_account(&mut self, address: Address, account: &AllocAccount) {
        let code_hash = if account.code.is_empty() {
            KECCAK_EMPTY
        } else {
            let hash = keccak256(&account.code);
            self.codes.insert(hash, account.code.clone());
            hash
        };
        let info = AccountInfo { nonce: account.nonce, balance: account.balance, code_hash };
        self.backend.legacy.set_account(address, info);
        for (slot, value) in &account.storage {
            self.backend.legacy.set_storage(address, *slot, *value);
        }
    }

    /// Returns the committed root.
    pub fn root(&self) -> B256 {
        self.backend.root()
    }

    /// Returns `true` if the new layout is active.
    pub const fn is_stateless(&self) -> bool {
        self.backend.tree.is_some()
    }

    /// Returns the committed legacy layout.
    pub const fn legacy(&self) -> &LegacyStore {
        &self.backend.legacy
    }

    /// Exports the committed state as an allocation, merging both layouts.
    ///
    /// Only the accounts and slots the state can name are included: everything in the legacy
    /// layout and whatever was written to the new layout by this state. Leaves handed over as
    /// raw tree leaves are not enumerable and are missing here.
    pub fn dump(&self) -> Alloc {
        let mut addresses: BTreeSet<Address> = self.backend.legacy.all_addresses().collect();
        if let Some(tree) = &self.backend.tree {
            addresses.extend(tree.addresses());
        }

        let mut alloc = Alloc::new();
        for address in addresses {
            let Some(info) = self.read_account(address) else { continue };
            let mut storage = BTreeMap::new();
            for (slot, value) in self.backend.legacy.storage_slots(address) {
                if let Some(value) = self.read_storage(address, slot).filter(|v| *v == value) {
                    storage.insert(slot, value);
                }
            }
            if let Some(tree) = &self.backend.tree {
                storage.extend(tree.storage_slots(address));
            }
            let code = self.codes.get(&info.code_hash).cloned().unwrap_or_default();
            alloc.insert(
                address,
                AllocAccount { code, storage, balance: info.balance, nonce: info.nonce },
            );
        }
        alloc
    }

    /// Reads an account from the committed layouts.
    fn read_account(&self, address: Address) -> Option<AccountInfo> {
        let Some(tree) = &self.backend.tree else {
            return self.backend.legacy.account(address);
        };
        if let Some(info) = tree.account(address) {
            return Some(info);
        }
        if self.transition.is_account_migrated(keccak256(address)) {
            return None;
        }
        self.backend.legacy.account(address)
    }

    /// Reads a storage slot from the committed layouts.
    fn read_storage(&self, address: Address, slot: U256) -> Option<U256> {
        let Some(tree) = &self.backend.tree else {
            return self.backend.legacy.storage(address, slot);
        };
        if let Some(value) = tree.storage(address, slot) {
            return Some(value);
        }
        if self.transition.is_slot_migrated(keccak256(address), keccak256(B256::from(slot))) {
            return None;
        }
        self.backend.legacy.storage(address, slot)
    }

    fn account_mut(&mut self, address: Address) -> &mut CachedAccount {
        if !self.accounts.contains_key(&address) {
            if self.backend.tree.is_some() {
                self.witness.extend(account_leaf_keys(address));
            }
            let original = self.read_account(address);
            self.accounts.insert(address, CachedAccount::new(original));
        }
        self.accounts.entry(address).or_insert_with(|| CachedAccount::new(None))
    }

    /// Makes the account exist and marks it as touched before a write.
    fn prepare_write(&mut self, address: Address) -> &mut CachedAccount {
        if self.touched.insert(address) {
            self.journal.push(JournalEntry::Touched(address));
        }
        let account = self.account_mut(address);
        let created = !account.exists;
        account.exists = true;
        if created {
            self.journal.push(JournalEntry::Created(address));
        }
        self.accounts.entry(address).or_insert_with(|| CachedAccount::new(None))
    }

    fn delete_account(&mut self, address: Address) {
        if let Some(account) = self.accounts.get_mut(&address) {
            account.exists = false;
            account.info = AccountInfo::default();
            account.storage.clear();
            account.storage_cleared = true;
        }
    }
}

impl StateDb for MemoryState {
    fn snapshot(&mut self) -> SnapshotId {
        self.journal.len()
    }

    fn revert_to_snapshot(&mut self, id: SnapshotId) {
        let entries: Vec<_> = self.journal.unwind(id).collect();
        for entry in entries {
            match entry {
                JournalEntry::Created(address) => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.exists = false;
                    }
                }
                JournalEntry::BalanceChanged { address, prev } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.info.balance = prev;
                    }
                }
                JournalEntry::NonceChanged { address, prev } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.info.nonce = prev;
                    }
                }
                JournalEntry::CodeChanged { address, prev } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.info.code_hash = prev;
                    }
                }
                JournalEntry::StorageChanged { address, slot, prev } => {
                    if let Some(account) = self.accounts.get_mut(&address) {
                        account.storage.insert(slot, prev);
                    }
                }
                JournalEntry::Touched(address) => {
                    self.touched.remove(&address);
                }
                JournalEntry::LogAdded => {
                    self.logs.pop();
                }
            }
        }
    }

    fn exists(&mut self, address: Address) -> bool {
        self.account_mut(address).exists
    }

    fn is_empty(&mut self, address: Address) -> bool {
        let account = self.account_mut(address);
        !account.exists || account.info.is_empty()
    }

    fn balance(&mut self, address: Address) -> U256 {
        self.account_mut(address).info.balance
    }

    fn set_balance(&mut self, address: Address, balance: U256) {
        let account = self.prepare_write(address);
        let prev = core::mem::replace(&mut account.info.balance, balance);
        self.journal.push(JournalEntry::BalanceChanged { address, prev });
    }

    fn nonce(&mut self, address: Address) -> u64 {
        self.account_mut(address).info.nonce
    }

    fn set_nonce(&mut self, address: Address, nonce: u64) {
        let account = self.prepare_write(address);
        let prev = core::mem::replace(&mut account.info.nonce, nonce);
        self.journal.push(JournalEntry::NonceChanged { address, prev });
    }

    fn code(&mut self, address: Address) -> Bytes {
        let code_hash = self.account_mut(address).info.code_hash;
        self.codes.get(&code_hash).cloned().unwrap_or_default()
    }

    fn code_hash(&mut self, address: Address) -> B256 {
        let account = self.account_mut(address);
        if account.exists {
            account.info.code_hash
        } else {
            B256::ZERO
        }
    }

    fn set_code(&mut self, address: Address, code: Bytes) {
        let code_hash = if code.is_empty() { KECCAK_EMPTY } else { keccak256(&code) };
        if !code.is_empty() {
            self.codes.insert(code_hash, code);
        }
        let account = self.prepare_write(address);
        let prev = core::mem::replace(&mut account.info.code_hash, code_hash);
        self.journal.push(JournalEntry::CodeChanged { address, prev });
    }

    fn storage(&mut self, address: Address, slot: U256) -> U256 {
        let account = self.account_mut(address);
        if let Some(value) = account.storage.get(&slot) {
            return *value;
        }
        let cleared = account.storage_cleared;

        let value = if cleared {
            U256::ZERO
        } else {
            if self.backend.tree.is_some() {
                self.witness.insert(storage_leaf_key(address, slot));
            }
            self.read_storage(address, slot).unwrap_or_default()
        };
        let account = self.account_mut(address);
        if !cleared {
            account.original_storage.insert(slot, value);
        }
        account.storage.insert(slot, value);
        value
    }

    fn set_storage(&mut self, address: Address, slot: U256, value: U256) {
        let prev = self.storage(address, slot);
        let account = self.prepare_write(address);
        account.storage.insert(slot, value);
        self.journal.push(JournalEntry::StorageChanged { address, slot, prev });
    }

    fn set_tx_context(&mut self, hash: TxHash, index: usize) {
        self.tx_hash = hash;
        self.tx_index = index;
    }

    fn add_log(&mut self, log: Log) {
        self.logs.push((self.tx_hash, log));
        self.journal.push(JournalEntry::LogAdded);
    }

    fn logs(&self, hash: TxHash) -> Vec<Log> {
        self.logs.iter().filter(|(tx, _)| *tx == hash).map(|(_, log)| log.clone()).collect()
    }

    fn all_logs(&self) -> Vec<Log> {
        self.logs.iter().map(|(_, log)| log.clone()).collect()
    }

    fn finalize(&mut self, clear_empty: bool) {
        if clear_empty {
            let empty: Vec<_> = self
                .touched
                .iter()
                .copied()
                .filter(|address| {
                    self.accounts
                        .get(address)
                        .is_some_and(|account| account.exists && account.info.is_empty())
                })
                .collect();
            for address in empty {
                self.delete_account(address);
            }
        }
        self.touched.clear();
        self.journal.clear();
    }

    fn intermediate_root(&mut self, clear_empty: bool) -> B256 {
        self.finalize(clear_empty);
        let mut scratch = self.backend.clone();
        for (address, account) in &self.accounts {
            scratch.apply(*address, account);
        }
        scratch.root()
    }

    fn commit(&mut self, block_number: BlockNumber, clear_empty: bool) -> Result<B256, StateError> {
        self.finalize(clear_empty);
        let accounts = core::mem::take(&mut self.accounts);
        for (address, account) in &accounts {
            self.backend.apply(*address, account);
        }
        let root = self.backend.root();
        debug!(block_number, %root, accounts = accounts.len(), "Committed state");
        Ok(root)
    }

    fn reopen(&mut self, root: B256) -> Result<(), StateError> {
        let have = self.backend.root();
        if have != root {
            return Err(StateError::RootMismatch { have, want: root });
        }
        self.accounts.clear();
        self.journal.clear();
        self.touched.clear();
        self.logs.clear();
        self.witness.clear();
        self.tx_hash = TxHash::ZERO;
        self.tx_index = 0;
        Ok(())
    }

    fn transition(&self) -> &TransitionTracker {
        &self.transition
    }

    fn transition_mut(&mut self) -> &mut TransitionTracker {
        &mut self.transition
    }

    fn advance_transition(&mut self, stride: u64) -> Result<MigrationProgress, TransitionError> {
        let tree = self.backend.tree.as_mut().ok_or(TransitionError::LayoutInactive)?;
        self.transition.advance(&self.backend.legacy, tree, stride)
    }

    fn stem_tree(&self) -> Option<&StemTree> {
        self.backend.tree.as_ref()
    }

    fn witness_keys(&self) -> Vec<B256> {
        self.witness.iter().copied().collect()
    }
}
