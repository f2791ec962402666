use core::ops::Bound;

use alloy_primitives::{keccak256, Address, B256, U256};
use auto_impl::auto_impl;

use crate::state::{AccountInfo, LegacySlot};

/// Ordered read access to the legacy layout, keyed by the hashes of addresses and slots.
#[auto_impl(&, Box)]
pub trait LegacySource {
    /// Returns the first account whose address hash lies within `from` and above.
    fn next_account(&self, from: Bound<B256>) -> Option<Address>;

    /// Returns the header of the account with hash `address_hash`, if still present.
    fn account_header(&self, address_hash: B256) -> Option<AccountInfo>;

    /// Returns the first slot of the account whose slot hash lies within `from` and above.
    fn next_slot(&self, address_hash: B256, from: Bound<B256>) -> Option<LegacySlot>;
}

/// Destination of migrated leaves. A sink must not overwrite keys it already holds, since
/// those were written by execution after the legacy value was last current.
#[auto_impl(&mut, Box)]
pub trait MigrationSink {
    /// Copies a storage slot.
    fn migrate_slot(&mut self, address: Address, slot: U256, value: U256);

    /// Copies an account header.
    fn migrate_account(&mut self, address: Address, info: AccountInfo);
}

/// Position of the enumeration over the legacy layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationCursor {
    /// Nothing migrated yet.
    Start,
    /// Within an account.
    Account {
        /// Account being migrated.
        address: Address,
        /// Hash of the next slot to migrate, `None` for the first one.
        next_slot: Option<B256>,
        /// Whether all slots are done and only the header is left.
        storage_processed: bool,
    },
    /// Everything migrated.
    Done,
}

/// A leaf produced by [`MigrationIter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationItem {
    /// A storage slot.
    Slot {
        /// Owner of the slot.
        address: Address,
        /// Hash of the slot key.
        slot_hash: B256,
        /// Slot key.
        slot: U256,
        /// Slot value.
        value: U256,
    },
    /// An account header.
    Account {
        /// Account address.
        address: Address,
        /// Account header.
        info: AccountInfo,
    },
}

/// Resumable enumeration of the legacy layout: accounts in address-hash order, each one's slots
/// in slot-hash order followed by its header.
///
/// [`MigrationIter::position`] always points at the next leaf to produce, so it can be persisted
/// after any item and handed to [`MigrationIter::new`] later.
#[derive(Debug)]
pub struct MigrationIter<'a, S> {
    source: &'a S,
    position: MigrationCursor,
}

impl<'a, S: LegacySource> MigrationIter<'a, S> {
    /// Creates an iterator resuming at `position`.
    pub const fn new(source: &'a S, position: MigrationCursor) -> Self {
        Self { source, position }
    }

    /// Returns the position of the next leaf.
    pub const fn position(&self) -> MigrationCursor {
        self.position
    }

    fn enter(address: Option<Address>) -> MigrationCursor {
        match address {
            Some(address) => {
                MigrationCursor::Account { address, next_slot: None, storage_processed: false }
            }
            None => MigrationCursor::Done,
        }
    }
}

impl<S: LegacySource> Iterator for MigrationIter<'_, S> {
    type Item = MigrationItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.position {
                MigrationCursor::Done => return None,
                MigrationCursor::Start => {
                    self.position = Self::enter(self.source.next_account(Bound::Unbounded));
                }
                MigrationCursor::Account { address, next_slot, storage_processed: false } => {
                    let address_hash = keccak256(address);
                    let from = next_slot.map_or(Bound::Unbounded, Bound::Included);
                    let Some(slot) = self.source.next_slot(address_hash, from) else {
                        self.position = MigrationCursor::Account {
                            address,
                            next_slot: None,
                            storage_processed: true,
                        };
                        continue;
                    };
                    let following =
                        self.source.next_slot(address_hash, Bound::Excluded(slot.hash)).map(|s| s.hash);
                    self.position = MigrationCursor::Account {
                        address,
                        next_slot: following,
                        storage_processed: following.is_none(),
                    };
                    return Some(MigrationItem::Slot {
                        address,
                        slot_hash: slot.hash,
                        slot: slot.key,
                        value: slot.value,
                    });
                }
                MigrationCursor::Account { address, storage_processed: true, .. } => {
                    let address_hash = keccak256(address);
                    let header = self.source.account_header(address_hash);
                    self.position =
                        Self::enter(self.source.next_account(Bound::Excluded(address_hash)));
                    if let Some(info) = header {
                        return Some(MigrationItem::Account { address, info });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rstest::rstest;

    use super::*;
    use crate::{
        state::LegacyStore,
        transition::{TransitionStatus, TransitionTracker},
    };

    #[derive(Debug, Default)]
    struct RecordingSink {
        slots: Vec<(Address, U256)>,
        accounts: Vec<Address>,
    }

    impl MigrationSink for RecordingSink {
        fn migrate_slot(&mut self, address: Address, slot: U256, _value: U256) {
            self.slots.push((address, slot));
        }

        fn migrate_account(&mut self, address: Address, _info: AccountInfo) {
            self.accounts.push(address);
        }
    }

    /// Five accounts where account `i` holds `i` slots, plus one account with storage but no
    /// header. Returns the store with the number of leaves it holds.
    fn legacy() -> (LegacyStore, u64) {
        let mut store = LegacyStore::default();
        let mut leaves = 0;
        for i in 1..=5u8 {
            let address = Address::with_last_byte(i);
            store.set_account(address, AccountInfo { nonce: i.into(), ..Default::default() });
            leaves += 1;
            for slot in 0..u64::from(i) {
                store.set_storage(address, U256::from(slot), U256::from(slot + 1));
                leaves += 1;
            }
        }
        let headerless = Address::with_last_byte(0xee);
        for slot in 0..3u64 {
            store.set_storage(headerless, U256::from(slot), U256::from(0xff));
            leaves += 1;
        }
        (store, leaves)
    }

    #[test]
    fn test_iter_yields_slots_before_header() {
        let (store, leaves) = legacy();
        let items: Vec<_> = MigrationIter::new(&store, MigrationCursor::Start).collect();
        assert_eq!(items.len() as u64, leaves);

        let mut seen_headers = BTreeSet::new();
        for item in &items {
            match item {
                MigrationItem::Slot { address, .. } => assert!(!seen_headers.contains(address)),
                MigrationItem::Account { address, .. } => {
                    assert!(seen_headers.insert(*address));
                }
            }
        }
        assert_eq!(seen_headers.len(), 5);
        assert!(!seen_headers.contains(&Address::with_last_byte(0xee)));
    }

    #[test]
    fn test_iter_resumes_from_any_position() {
        let (store, _) = legacy();
        let all: Vec<_> = MigrationIter::new(&store, MigrationCursor::Start).collect();

        let mut iter = MigrationIter::new(&store, MigrationCursor::Start);
        for skip in 0..all.len() {
            let rest: Vec<_> = MigrationIter::new(&store, iter.position()).collect();
            assert_eq!(rest, all[skip..]);
            iter.next();
        }
        assert_eq!(iter.next(), None);
        assert_eq!(iter.position(), MigrationCursor::Done);
    }

    #[rstest]
    #[case::one(1)]
    #[case::two(2)]
    #[case::three(3)]
    #[case::seven(7)]
    #[case::everything(1000)]
    fn test_advance_covers_every_leaf_once(#[case] stride: u64) {
        let (store, leaves) = legacy();
        let mut sink = RecordingSink::default();
        let mut status = TransitionStatus { started: true, ..Default::default() };

        let mut migrated = 0;
        let mut rounds = 0;
        while !status.ended {
            // Every block starts from the persisted metadata only.
            let mut tracker = TransitionTracker::new(status);
            let progress = tracker.advance(&store, &mut sink, stride).unwrap();
            assert!(progress.leaves() <= stride);
            migrated += progress.leaves();
            status = tracker.status();
            rounds += 1;
            assert!(rounds <= leaves / stride + 2, "conversion does not terminate");
        }

        assert_eq!(migrated, leaves);
        assert_eq!((sink.slots.len() + sink.accounts.len()) as u64, leaves);
        assert_eq!(sink.slots.iter().collect::<BTreeSet<_>>().len(), sink.slots.len());
        assert_eq!(sink.accounts.iter().collect::<BTreeSet<_>>().len(), sink.accounts.len());
        assert_eq!(sink.accounts.len(), 5);
        assert_eq!(status.current_account_address, None);

        // Nothing left once ended.
        let mut tracker = TransitionTracker::new(status);
        assert_eq!(tracker.advance(&store, &mut sink, stride).unwrap().leaves(), 0);
    }
}
