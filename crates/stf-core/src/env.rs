//! Block environment supplied by the caller and the execution context derived from it.

use core::cell::Cell;
use std::collections::BTreeMap;

use alloy_eips::{
    eip1559::{calc_next_block_base_fee, BaseFeeParams},
    eip4895::Withdrawal,
};
use alloy_primitives::{Address, BlockNumber, BlockTimestamp, ChainId, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    chain::{ChainConfig, Rules},
    constants::{frontier::BLOCK_HASH_WINDOW, london::INITIAL_BASE_FEE},
    eip4844::{blob_gas_price, calc_excess_blob_gas},
    transition::TransitionStatus,
};

/// A block referenced as an ommer by a proof-of-work block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ommer {
    /// Depth of the ommer relative to the including block.
    #[serde(with = "alloy_serde::quantity")]
    pub delta: u64,
    /// Producer of the ommer.
    pub address: Address,
}

/// Everything the caller knows about the block to execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockEnv {
    /// Beneficiary of fees and rewards.
    pub coinbase: Address,
    /// Block number.
    pub number: BlockNumber,
    /// Block timestamp.
    pub timestamp: BlockTimestamp,
    /// Difficulty, before the merge.
    pub difficulty: U256,
    /// `PREVRANDAO` value, after the merge.
    pub random: Option<B256>,
    /// Block gas limit.
    pub gas_limit: u64,
    /// Base fee. Derived from the parent fields when absent.
    pub base_fee: Option<u64>,
    /// Base fee of the parent.
    pub parent_base_fee: Option<u64>,
    /// Gas used by the parent.
    pub parent_gas_used: Option<u64>,
    /// Gas limit of the parent.
    pub parent_gas_limit: Option<u64>,
    /// Excess blob gas. Derived from the parent fields when absent.
    pub excess_blob_gas: Option<u64>,
    /// Excess blob gas of the parent.
    pub parent_excess_blob_gas: Option<u64>,
    /// Blob gas used by the parent.
    pub parent_blob_gas_used: Option<u64>,
    /// Known hashes of previous blocks.
    pub block_hashes: BTreeMap<BlockNumber, B256>,
    /// Ommers of the block.
    pub ommers: Vec<Ommer>,
    /// Withdrawals of the block, after Shanghai.
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// Persisted progress of the storage format conversion.
    pub transition: TransitionStatus,
}

impl BlockEnv {
    /// Returns the base fee of the block: the configured one, else the one following from the
    /// parent fields once London is active.
    pub fn resolve_base_fee(&self, chain: &ChainConfig) -> Option<u64> {
        if self.base_fee.is_some() {
            return self.base_fee;
        }
        if !chain.rules(self.number, self.timestamp).is_london {
            return None;
        }
        let parent = self.number.checked_sub(1)?;
        // The parent timestamp is unknown, block-activated London is the only case that matters.
        if !chain.rules(parent, self.timestamp).is_london {
            return Some(INITIAL_BASE_FEE);
        }
        Some(calc_next_block_base_fee(
            self.parent_gas_used?,
            self.parent_gas_limit?,
            self.parent_base_fee?,
            BaseFeeParams::ethereum(),
        ))
    }

    /// Returns the excess blob gas of the block: the configured one, else the one following
    /// from the parent fields when both are known.
    pub fn resolve_excess_blob_gas(&self) -> Option<u64> {
        self.excess_blob_gas.or_else(|| match (self.parent_excess_blob_gas, self.parent_blob_gas_used) {
            (Some(excess), Some(used)) => Some(calc_excess_blob_gas(Some(excess), Some(used))),
            _ => None,
        })
    }
}

/// Block hashes reachable by running code.
///
/// A lookup for a block inside the window that the environment does not know is not an error
/// for the running transaction. It is recorded here and turned into a block-level failure once
/// the transaction completes.
#[derive(Debug, Default)]
pub struct BlockHashes {
    hashes: BTreeMap<BlockNumber, B256>,
    missing: Cell<Option<BlockNumber>>,
}

impl BlockHashes {
    /// Creates the lookup from the known hashes.
    pub fn new(hashes: BTreeMap<BlockNumber, B256>) -> Self {
        Self { hashes, missing: Cell::new(None) }
    }

    /// Returns the hash of `number` as seen from block `current`, or zero outside the window.
    pub fn get(&self, current: BlockNumber, number: BlockNumber) -> B256 {
        if number >= current || current - number > BLOCK_HASH_WINDOW {
            return B256::ZERO;
        }
        match self.hashes.get(&number) {
            Some(hash) => *hash,
            None => {
                if self.missing.get().is_none() {
                    self.missing.set(Some(number));
                }
                B256::ZERO
            }
        }
    }

    /// Returns the hash of `number` if the environment knows it, without recording a miss.
    pub fn known(&self, number: BlockNumber) -> Option<B256> {
        self.hashes.get(&number).copied()
    }

    /// Returns the first block number that was requested but unknown.
    pub fn missing(&self) -> Option<BlockNumber> {
        self.missing.get()
    }

    /// Iterates over the known hashes.
    pub fn iter(&self) -> impl Iterator<Item = (&BlockNumber, &B256)> {
        self.hashes.iter()
    }
}

/// Immutable per-block context handed to the message executor.
#[derive(Debug)]
pub struct BlockContext {
    /// Active protocol rules.
    pub rules: Rules,
    /// Chain id of the block.
    pub chain_id: ChainId,
    /// Beneficiary of fees.
    pub coinbase: Address,
    /// Block number.
    pub number: BlockNumber,
    /// Block timestamp.
    pub timestamp: BlockTimestamp,
    /// Difficulty, zero after the merge.
    pub difficulty: U256,
    /// `PREVRANDAO` value, after the merge.
    pub random: Option<B256>,
    /// Block gas limit.
    pub gas_limit: u64,
    /// Base fee, after London.
    pub base_fee: Option<u64>,
    /// Excess blob gas, when the block has a blob gas context.
    pub excess_blob_gas: Option<u64>,
    /// Reachable block hashes.
    pub block_hashes: BlockHashes,
}

impl BlockContext {
    /// Builds the context of `env` under `chain`.
    pub fn new(chain: &ChainConfig, env: &BlockEnv) -> Self {
        let rules = chain.rules(env.number, env.timestamp);
        Self {
            rules,
            chain_id: chain.chain_id,
            coinbase: env.coinbase,
            number: env.number,
            timestamp: env.timestamp,
            difficulty: if rules.is_merge { U256::ZERO } else { env.difficulty },
            random: env.random,
            gas_limit: env.gas_limit,
            base_fee: env.resolve_base_fee(chain),
            excess_blob_gas: env.resolve_excess_blob_gas(),
            block_hashes: BlockHashes::new(env.block_hashes.clone()),
        }
    }

    /// Returns the price of a unit of blob gas, when the block has a blob gas context.
    pub fn blob_gas_price(&self) -> Option<U256> {
        self.excess_blob_gas.map(blob_gas_price)
    }

    /// Returns the hash of block `number` as visible to running code.
    pub fn block_hash(&self, number: BlockNumber) -> B256 {
        self.block_hashes.get(self.number, number)
    }
}
