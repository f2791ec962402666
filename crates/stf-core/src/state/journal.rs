use alloy_primitives::{Address, B256, U256};

/// A reversible change to the live state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum JournalEntry {
    /// A non-existent account came into existence.
    Created(Address),
    BalanceChanged { address: Address, prev: U256 },
    NonceChanged { address: Address, prev: u64 },
    CodeChanged { address: Address, prev: B256 },
    StorageChanged { address: Address, slot: U256, prev: U256 },
    /// First touch of an account since the last finalization.
    Touched(Address),
    LogAdded,
}

/// Ordered record of changes since the last finalization. A snapshot is a position in it.
#[derive(Debug, Clone, Default)]
pub(super) struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub(super) fn push(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Removes and returns the entries recorded after `len`, newest first.
    pub(super) fn unwind(&mut self, len: usize) -> impl Iterator<Item = JournalEntry> + '_ {
        let len = len.min(self.entries.len());
        self.entries.drain(len..).rev()
    }

    pub(super) fn clear(&mut self) {
        self.entries.clear();
    }
}
