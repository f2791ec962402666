//! Progress tracking of the conversion from the legacy storage layout to the new one.
//!
//! The conversion is an enumeration of the legacy store in key-hash order: for every account,
//! first its storage slots and then the account header are copied into the new layout. A block
//! copies at most a fixed number of leaves, after which the position is persisted in a
//! [`TransitionStatus`] so that the next block resumes exactly where this one stopped.
//!
//! While the conversion is in progress, a key is served from the new layout once it has been
//! migrated (or written by execution) and from the legacy layout otherwise. Whether a key has
//! been migrated follows from comparing its hash with the cursor, see
//! [`TransitionTracker::is_account_migrated`] and [`TransitionTracker::is_slot_migrated`].

mod migration;

use alloy_primitives::{keccak256, Address, B256};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use migration::{LegacySource, MigrationCursor, MigrationIter, MigrationItem, MigrationSink};

use crate::error::TransitionError;

/// Persisted migration metadata, stored alongside the state and echoed in block results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionStatus {
    /// Whether the conversion has begun.
    #[serde(default)]
    pub started: bool,
    /// Whether every legacy leaf has been migrated.
    #[serde(default)]
    pub ended: bool,
    /// Account currently being migrated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_account_address: Option<Address>,
    /// Hash of the next storage slot to migrate in the current account. `None` means the
    /// first slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_slot_hash: Option<B256>,
    /// Whether the storage of the current account has been migrated completely.
    #[serde(default)]
    pub storage_processed: bool,
}

/// Phase of the conversion. Phases only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransitionPhase {
    /// Only the legacy layout exists.
    NotStarted,
    /// Both layouts are consulted, depending on the cursor.
    InProgress,
    /// Only the new layout is consulted.
    Completed,
}

/// Leaves migrated by one call to [`TransitionTracker::advance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationProgress {
    /// Storage slots copied.
    pub slots: u64,
    /// Account headers copied.
    pub accounts: u64,
}

impl MigrationProgress {
    /// Total number of leaves copied.
    pub const fn leaves(&self) -> u64 {
        self.slots + self.accounts
    }
}

/// The conversion state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionTracker {
    status: TransitionStatus,
}

impl TransitionTracker {
    /// Resumes tracking from persisted metadata.
    pub const fn new(status: TransitionStatus) -> Self {
        Self { status }
    }

    /// Returns the metadata to persist.
    pub const fn status(&self) -> TransitionStatus {
        self.status
    }

    /// Returns the current phase.
    pub const fn phase(&self) -> TransitionPhase {
        if self.status.ended {
            TransitionPhase::Completed
        } else if self.status.started {
            TransitionPhase::InProgress
        } else {
            TransitionPhase::NotStarted
        }
    }

    /// Returns `true` while both layouts have to be consulted.
    pub const fn in_transition(&self) -> bool {
        matches!(self.phase(), TransitionPhase::InProgress)
    }

    /// Returns `true` once the legacy layout is no longer needed.
    pub const fn transitioned(&self) -> bool {
        matches!(self.phase(), TransitionPhase::Completed)
    }

    /// Sets the phase flags. Flags that are already set stay set.
    pub fn init(&mut self, started: bool, ended: bool) {
        self.status.started |= started || ended;
        self.status.ended |= ended;
    }

    /// Starts the conversion at the beginning of the legacy key space. Has no effect once
    /// started.
    pub fn start(&mut self) {
        if self.phase() == TransitionPhase::NotStarted {
            debug!("Starting format conversion");
            self.status.started = true;
        }
    }

    /// Sets the account being migrated.
    pub fn set_current_account_address(&mut self, address: Option<Address>) {
        self.status.current_account_address = address;
    }

    /// Sets the next slot to migrate within the current account.
    pub fn set_current_slot_hash(&mut self, slot_hash: Option<B256>) {
        self.status.current_slot_hash = slot_hash;
    }

    /// Marks the storage of the current account as migrated.
    pub fn set_storage_processed(&mut self, processed: bool) {
        self.status.storage_processed = processed;
    }

    /// Returns the enumeration position encoded in the metadata.
    pub fn cursor(&self) -> Result<MigrationCursor, TransitionError> {
        match self.phase() {
            TransitionPhase::NotStarted => Err(TransitionError::NotStarted),
            TransitionPhase::Completed => Ok(MigrationCursor::Done),
            TransitionPhase::InProgress => match self.status.current_account_address {
                Some(address) => Ok(MigrationCursor::Account {
                    address,
                    next_slot: self.status.current_slot_hash,
                    storage_processed: self.status.storage_processed,
                }),
                None => match self.status.current_slot_hash {
                    Some(slot_hash) => Err(TransitionError::DanglingSlotCursor(slot_hash)),
                    None => Ok(MigrationCursor::Start),
                },
            },
        }
    }

    fn set_cursor(&mut self, cursor: MigrationCursor) {
        match cursor {
            MigrationCursor::Start => {
                self.status.current_account_address = None;
                self.status.current_slot_hash = None;
                self.status.storage_processed = false;
            }
            MigrationCursor::Account { address, next_slot, storage_processed } => {
                self.status.current_account_address = Some(address);
                self.status.current_slot_hash = next_slot;
                self.status.storage_processed = storage_processed;
            }
            MigrationCursor::Done => {
                self.status.ended = true;
                self.status.current_account_address = None;
                self.status.current_slot_hash = None;
                self.status.storage_processed = false;
            }
        }
    }

    /// Returns `true` if the header of the account with hash `address_hash` has been copied to
    /// the new layout.
    pub fn is_account_migrated(&self, address_hash: B256) -> bool {
        match self.phase() {
            TransitionPhase::NotStarted => false,
            TransitionPhase::Completed => true,
            TransitionPhase::InProgress => match self.status.current_account_address {
                None => false,
                // Headers are copied after the storage, so the current account is not done yet.
                Some(current) => address_hash < keccak256(current),
            },
        }
    }

    /// Returns `true` if the slot with hash `slot_hash` of the account with hash
    /// `address_hash` has been copied to the new layout.
    pub fn is_slot_migrated(&self, address_hash: B256, slot_hash: B256) -> bool {
        match self.phase() {
            TransitionPhase::NotStarted => false,
            TransitionPhase::Completed => true,
            TransitionPhase::InProgress => {
                let Some(current) = self.status.current_account_address else {
                    return false;
                };
                let current_hash = keccak256(current);
                if address_hash != current_hash {
                    return address_hash < current_hash;
                }
                if self.status.storage_processed {
                    return true;
                }
                self.status.current_slot_hash.is_some_and(|next| slot_hash < next)
            }
        }
    }

    /// Copies up to `stride` leaves from `source` into `sink`, continuing from the persisted
    /// cursor, and records the new position.
    ///
    /// Does nothing once the conversion has completed.
    pub fn advance<S, K>(
        &mut self,
        source: &S,
        sink: &mut K,
        stride: u64,
    ) -> Result<MigrationProgress, TransitionError>
    where
        S: LegacySource,
        K: MigrationSink,
    {
        let cursor = self.cursor()?;
        let mut progress = MigrationProgress::default();
        if cursor == MigrationCursor::Done {
            return Ok(progress);
        }

        let mut iter = MigrationIter::new(source, cursor);
        while progress.leaves() < stride {
            match iter.next() {
                Some(MigrationItem::Slot { address, slot, value, .. }) => {
                    sink.migrate_slot(address, slot, value);
                    progress.slots += 1;
                }
                Some(MigrationItem::Account { address, info }) => {
                    sink.migrate_account(address, info);
                    progress.accounts += 1;
                }
                None => break,
            }
        }
        self.set_cursor(iter.position());

        debug!(
            slots = progress.slots,
            accounts = progress.accounts,
            ended = self.status.ended,
            cursor = ?self.status.current_account_address,
            "Advanced format conversion"
        );
        Ok(progress)
    }
}
