use std::path::{Path, PathBuf};

use alloy_consensus::TxEnvelope;
use alloy_primitives::{Bytes, ChainId};
use alloy_rlp::Decodable;
use stf_core::{BlockTransaction, RejectedTx};
use tracing::debug;

use crate::t8n::Transaction;

/// Parses a number given either as `0x`-prefixed hex or as decimal.
pub fn parse_quantity(value: &str) -> Option<u64> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

/// Converts the JSON transactions into block transactions. A transaction that cannot be
/// converted stays in the list as malformed, so that it is rejected at its index.
pub fn to_block_transactions(txs: &[Transaction], chain_id: ChainId) -> Vec<BlockTransaction> {
    txs.iter()
        .enumerate()
        .map(|(index, tx)| match tx.to_envelope(chain_id) {
            Ok(envelope) => BlockTransaction::Signed(envelope),
            Err(err) => {
                debug!(index, error = %err, "Failed to convert transaction");
                BlockTransaction::Malformed { reason: err.to_string() }
            }
        })
        .collect()
}

/// Decodes an RLP list of signed transactions.
pub fn decode_transactions(mut rlp: &[u8]) -> Result<Vec<BlockTransaction>, alloy_rlp::Error> {
    let txs = Vec::<TxEnvelope>::decode(&mut rlp)?;
    Ok(txs.into_iter().map(BlockTransaction::Signed).collect())
}

/// Encodes the transactions that made it into the block as an RLP list.
pub fn encode_body(txs: &[BlockTransaction], rejected: &[RejectedTx]) -> Bytes {
    let included: Vec<&TxEnvelope> = txs
        .iter()
        .enumerate()
        .filter(|(index, _)| !rejected.iter().any(|rejected| rejected.index == *index as u64))
        .filter_map(|(_, tx)| match tx {
            BlockTransaction::Signed(envelope) => Some(envelope),
            BlockTransaction::Malformed { .. } => None,
        })
        .collect();
    alloy_rlp::encode(&included).into()
}

/// Resolves an output file name against the base directory.
pub fn output_path(name: &str, basedir: Option<&Path>) -> PathBuf {
    basedir.map_or_else(|| PathBuf::from(name), |dir| dir.join(name))
}
