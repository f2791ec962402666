//! Block environment as supplied in `env.json`.

use std::collections::BTreeMap;

use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{Address, BlockNumber, B256, U256};
use serde::Deserialize;
use stf_core::{transition::TransitionStatus, BlockEnv, Ommer};

use crate::t8n::{parse_quantity, Result, T8nError};

/// The `env.json` input of the t8n tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Env {
    /// Beneficiary of fees and rewards
    pub current_coinbase: Address,
    /// Difficulty of the block, before the merge
    #[serde(default)]
    pub current_difficulty: Option<U256>,
    /// `PREVRANDAO` of the block, after the merge
    #[serde(default)]
    pub current_random: Option<B256>,
    /// Gas limit of the block
    #[serde(with = "alloy_serde::quantity")]
    pub current_gas_limit: u64,
    /// Number of the block
    #[serde(with = "alloy_serde::quantity")]
    pub current_number: u64,
    /// Timestamp of the block
    #[serde(with = "alloy_serde::quantity")]
    pub current_timestamp: u64,
    /// Base fee of the block
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub current_base_fee: Option<u64>,
    /// Base fee of the parent
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub parent_base_fee: Option<u64>,
    /// Gas used by the parent
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub parent_gas_used: Option<u64>,
    /// Gas limit of the parent
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub parent_gas_limit: Option<u64>,
    /// Excess blob gas of the block
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub current_excess_blob_gas: Option<u64>,
    /// Excess blob gas of the parent
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub parent_excess_blob_gas: Option<u64>,
    /// Blob gas used by the parent
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub parent_blob_gas_used: Option<u64>,
    /// Hashes of previous blocks, keyed by hex or decimal block number
    #[serde(default)]
    pub block_hashes: BTreeMap<String, B256>,
    /// Ommers of the block
    #[serde(default)]
    pub ommers: Vec<Ommer>,
    /// Withdrawals of the block
    #[serde(default)]
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// Account the format conversion stopped at
    #[serde(default)]
    pub current_conversion_address: Option<Address>,
    /// Next slot hash of the account the format conversion stopped at
    #[serde(default)]
    pub current_conversion_slot_hash: Option<B256>,
    /// Whether the format conversion has started
    #[serde(default)]
    pub current_conversion_started: bool,
    /// Whether the format conversion has ended
    #[serde(default)]
    pub current_conversion_ended: bool,
    /// Whether the storage of the current conversion account is done
    #[serde(default)]
    pub current_conversion_storage_processed: bool,
}

impl Env {
    /// Returns the persisted progress of the format conversion.
    pub const fn transition_status(&self) -> TransitionStatus {
        TransitionStatus {
            started: self.current_conversion_started,
            ended: self.current_conversion_ended,
            current_account_address: self.current_conversion_address,
            current_slot_hash: self.current_conversion_slot_hash,
            storage_processed: self.current_conversion_storage_processed,
        }
    }

    /// Converts into the environment of the executor.
    pub fn to_block_env(&self) -> Result<BlockEnv> {
        let block_hashes = self
            .block_hashes
            .iter()
            .map(|(number, hash)| {
                let number: BlockNumber = parse_quantity(number).ok_or_else(|| {
                    T8nError::InvalidEnv(format!("invalid block number in blockHashes: {number}"))
                })?;
                Ok((number, *hash))
            })
            .collect::<Result<_>>()?;

        Ok(BlockEnv {
            coinbase: self.current_coinbase,
            number: self.current_number,
            timestamp: self.current_timestamp,
            difficulty: self.current_difficulty.unwrap_or_default(),
            random: self.current_random,
            gas_limit: self.current_gas_limit,
            base_fee: self.current_base_fee,
            parent_base_fee: self.parent_base_fee,
            parent_gas_used: self.parent_gas_used,
            parent_gas_limit: self.parent_gas_limit,
            excess_blob_gas: self.current_excess_blob_gas,
            parent_excess_blob_gas: self.parent_excess_blob_gas,
            parent_blob_gas_used: self.parent_blob_gas_used,
            block_hashes,
            ommers: self.ommers.clone(),
            withdrawals: self.withdrawals.clone(),
            transition: self.transition_status(),
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;

    #[test]
    fn test_env_json() {
        let env: Env = serde_json::from_str(
            r#"{
                "currentCoinbase": "0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba",
                "currentGasLimit": "0x750a163df65e8a",
                "currentNumber": "0x3",
                "currentTimestamp": "0x3e8",
                "currentBaseFee": "0xa",
                "blockHashes": { "1": "0x0101010101010101010101010101010101010101010101010101010101010101", "0x2": "0x0202020202020202020202020202020202020202020202020202020202020202" },
                "ommers": [{ "delta": "0x1", "address": "0x000000000000000000000000000000000000000a" }],
                "withdrawals": [{ "index": "0x0", "validatorIndex": "0x1", "address": "0x000000000000000000000000000000000000000b", "amount": "0x2" }],
                "currentConversionStarted": true,
                "currentConversionAddress": "0x000000000000000000000000000000000000000c"
            }"#,
        )
        .unwrap();

        let block = env.to_block_env().unwrap();
        assert_eq!(block.coinbase, address!("0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba"));
        assert_eq!(block.number, 3);
        assert_eq!(block.base_fee, Some(10));
        assert_eq!(block.block_hashes.get(&1), Some(&B256::repeat_byte(1)));
        assert_eq!(block.block_hashes.get(&2), Some(&B256::repeat_byte(2)));
        assert_eq!(block.ommers[0].delta, 1);
        assert_eq!(block.withdrawals.unwrap()[0].amount, 2);
        assert!(block.transition.started);
        assert_eq!(block.transition.current_account_address, Some(Address::with_last_byte(0xc)));
    }

    #[test]
    fn test_invalid_block_hash_key() {
        let env = Env {
            block_hashes: BTreeMap::from([("one".to_string(), B256::ZERO)]),
            ..Default::default()
        };
        assert!(matches!(env.to_block_env(), Err(T8nError::InvalidEnv(_))));
    }
}
