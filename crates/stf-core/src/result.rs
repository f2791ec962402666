//! Outputs of block execution: receipts, rejections and the block result.

use alloy_consensus::{
    Eip658Value, Receipt as ConsensusReceipt, ReceiptEnvelope, ReceiptWithBloom, TxType,
};
use alloy_primitives::{Address, Bloom, Log, TxHash, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{transition::TransitionStatus, witness::Witness};

/// Receipt of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// EIP-2718 type of the transaction.
    #[serde(rename = "type", with = "alloy_serde::quantity")]
    pub tx_type: u8,
    /// Intermediate state root, before Byzantium.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<B256>,
    /// Whether execution succeeded. Meaningless when `root` is set.
    #[serde(with = "status")]
    pub status: bool,
    /// Gas used by the block up to and including this transaction.
    #[serde(with = "alloy_serde::quantity")]
    pub cumulative_gas_used: u64,
    /// Bloom of `logs`.
    pub logs_bloom: Bloom,
    /// Logs emitted by the transaction.
    pub logs: Vec<Log>,
    /// Hash of the transaction.
    pub transaction_hash: TxHash,
    /// Address of the deployed contract, for creations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
    /// Gas used by the transaction.
    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,
    /// Price paid per unit of gas.
    #[serde(with = "alloy_serde::quantity")]
    pub effective_gas_price: u128,
    /// Blob gas used by the transaction.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "alloy_serde::quantity::opt")]
    pub blob_gas_used: Option<u64>,
    /// Price paid per unit of blob gas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_gas_price: Option<U256>,
    /// Hash of the block, unknown to the executor and left zero.
    pub block_hash: B256,
    /// Position of the transaction among the included ones.
    #[serde(with = "alloy_serde::quantity")]
    pub transaction_index: u64,
}

impl Receipt {
    /// Converts into the consensus encoding used for the receipts root.
    pub fn to_envelope(&self) -> ReceiptEnvelope {
        let status = match self.root {
            Some(root) => Eip658Value::PostState(root),
            None => Eip658Value::Eip658(self.status),
        };
        let receipt = ReceiptWithBloom {
            receipt: ConsensusReceipt {
                status,
                cumulative_gas_used: self.cumulative_gas_used,
                logs: self.logs.clone(),
            },
            logs_bloom: self.logs_bloom,
        };
        match TxType::try_from(self.tx_type).unwrap_or(TxType::Legacy) {
            TxType::Legacy => ReceiptEnvelope::Legacy(receipt),
            TxType::Eip2930 => ReceiptEnvelope::Eip2930(receipt),
            TxType::Eip1559 => ReceiptEnvelope::Eip1559(receipt),
            TxType::Eip4844 => ReceiptEnvelope::Eip4844(receipt),
            TxType::Eip7702 => ReceiptEnvelope::Eip7702(receipt),
        }
    }
}

/// A transaction left out of the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedTx {
    /// Position in the supplied transaction list.
    #[serde(with = "alloy_serde::quantity")]
    pub index: u64,
    /// Reason for the rejection.
    pub error: String,
}

/// Result of executing a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Root of the post-state.
    pub state_root: B256,
    /// Root of the included transactions.
    pub tx_root: B256,
    /// Root of the receipts.
    pub receipts_root: B256,
    /// Hash of the RLP list of every log.
    pub logs_hash: B256,
    /// Union of the receipt blooms.
    pub logs_bloom: Bloom,
    /// Receipts of the included transactions.
    pub receipts: Vec<Receipt>,
    /// Transactions left out of the block.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedTx>,
    /// Difficulty of the block.
    #[serde(rename = "currentDifficulty", default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<U256>,
    /// Gas used by the block.
    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,
    /// Base fee of the block.
    #[serde(
        rename = "currentBaseFee",
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub base_fee: Option<u64>,
    /// Root of the withdrawals, when the block has any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<B256>,
    /// Excess blob gas of the block.
    #[serde(
        rename = "currentExcessBlobGas",
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub excess_blob_gas: Option<u64>,
    /// Blob gas used by the block.
    #[serde(
        rename = "blobGasUsed",
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub blob_gas_used: Option<u64>,
    /// Witness of the new-layout keys the block accessed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<Witness>,
    /// Progress of the format conversion to resume from in the next block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_status: Option<TransitionStatus>,
}

mod status {
    use serde::{Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(status: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        alloy_serde::quantity::serialize(&u8::from(*status), serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let value: u64 = alloy_serde::quantity::deserialize(deserializer)?;
        Ok(value != 0)
    }
}
