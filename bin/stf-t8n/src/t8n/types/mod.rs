mod env;
pub use env::*;

mod transaction;
pub use transaction::*;

use std::collections::BTreeMap;

use alloy_primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};
use stf_core::{state::Alloc, BlockTransaction, ExecutionResult};

/// Raw leaves of the new storage layout, by key.
pub type TreeLeaves = BTreeMap<B256, B256>;

/// Input data for state transition
#[derive(Debug)]
pub struct TransitionInputs {
    /// Pre-state allocation of accounts
    pub alloc: Alloc,
    /// Block environment configuration
    pub env: Env,
    /// Transactions to execute, in block order
    pub txs: Vec<BlockTransaction>,
    /// Already converted leaves of the new storage layout
    pub tree: Option<TreeLeaves>,
}

/// Results of a state transition
#[derive(Debug, Clone)]
pub struct TransitionResults {
    /// Execution result of the block
    pub result: ExecutionResult,
    /// Post-state allocation
    pub alloc: Alloc,
    /// Leaves of the new storage layout, once it is active
    pub tree: Option<TreeLeaves>,
    /// RLP list of the included transactions
    pub body: Bytes,
}

/// T8N tool output format printed to stdout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct T8nOutput {
    /// Post-state allocation
    pub alloc: Alloc,
    /// Transition results
    pub result: ExecutionResult,
    /// Leaves of the new storage layout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<TreeLeaves>,
}

/// Combined stdin input format
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StdinInput {
    /// Pre-state allocation of accounts
    pub alloc: Alloc,
    /// Block environment configuration
    pub env: Env,
    /// Transactions to execute
    #[serde(default)]
    pub txs: Vec<Transaction>,
    /// Hex-encoded RLP list of signed transactions, used instead of `txs`
    #[serde(default)]
    pub txs_rlp: Option<Bytes>,
    /// Already converted leaves of the new storage layout
    #[serde(default)]
    pub tree: Option<TreeLeaves>,
}
