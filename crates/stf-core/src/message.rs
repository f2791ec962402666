use alloy_consensus::{transaction::SignerRecoverable, Transaction, TxEnvelope};
use alloy_eips::{eip2930::AccessList, Typed2718};
use alloy_primitives::{Address, Bytes, TxHash, TxKind, B256, U256};

use crate::{chain::Rules, error::InvalidTransaction};

/// A transaction reduced to what the message executor needs: a recovered sender, the effective
/// gas price and the fee caps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// EIP-2718 type of the originating transaction.
    pub tx_type: u8,
    /// Hash of the originating transaction.
    pub hash: TxHash,
    /// Recovered sender.
    pub from: Address,
    /// Recipient, `None` for contract creation.
    pub to: Option<Address>,
    /// Nonce.
    pub nonce: u64,
    /// Transferred value.
    pub value: U256,
    /// Gas limit.
    pub gas_limit: u64,
    /// Price paid per unit of gas.
    pub gas_price: u128,
    /// Maximum fee per gas (equal to the gas price for legacy transactions).
    pub gas_fee_cap: u128,
    /// Maximum priority fee per gas (equal to the gas price for legacy transactions).
    pub gas_tip_cap: u128,
    /// Calldata or initcode.
    pub input: Bytes,
    /// Access list, empty before Berlin.
    pub access_list: AccessList,
    /// Versioned hashes of the attached blobs.
    pub blob_hashes: Vec<B256>,
    /// Maximum fee per blob gas.
    pub blob_gas_fee_cap: Option<u128>,
}

impl Message {
    /// Converts a signed transaction into a message, checking that its type is active under
    /// `rules`, that it is signed for `chain_id` and that the sender can be recovered.
    pub fn from_transaction(
        tx: &TxEnvelope,
        rules: &Rules,
        chain_id: u64,
        base_fee: Option<u64>,
    ) -> Result<Self, InvalidTransaction> {
        let tx_type = tx.ty();
        let supported = match tx {
            TxEnvelope::Legacy(_) => true,
            TxEnvelope::Eip2930(_) => rules.is_berlin,
            TxEnvelope::Eip1559(_) => rules.is_london,
            TxEnvelope::Eip4844(_) => rules.is_cancun,
            TxEnvelope::Eip7702(_) => false,
        };
        if !supported {
            return Err(InvalidTransaction::TxTypeNotSupported(tx_type));
        }

        if let Some(have) = tx.chain_id() {
            // Replay protection only exists from Spurious Dragon on.
            if (have != chain_id) && (tx_type != 0 || rules.is_eip158) {
                return Err(InvalidTransaction::InvalidChainId { have, want: chain_id });
            }
        }

        let from = tx
            .recover_signer()
            .map_err(|err| InvalidTransaction::InvalidSignature(err.to_string()))?;

        let to = match tx.kind() {
            TxKind::Call(to) => Some(to),
            TxKind::Create => None,
        };
        let base_fee = base_fee.filter(|_| rules.is_london);

        Ok(Self {
            tx_type,
            hash: *tx.tx_hash(),
            from,
            to,
            nonce: tx.nonce(),
            value: tx.value(),
            gas_limit: tx.gas_limit(),
            gas_price: tx.effective_gas_price(base_fee),
            gas_fee_cap: tx.max_fee_per_gas(),
            gas_tip_cap: tx.max_priority_fee_per_gas().unwrap_or_else(|| tx.max_fee_per_gas()),
            input: tx.input().clone(),
            access_list: tx.access_list().cloned().unwrap_or_default(),
            blob_hashes: tx.blob_versioned_hashes().map(<[B256]>::to_vec).unwrap_or_default(),
            blob_gas_fee_cap: tx.max_fee_per_blob_gas(),
        })
    }

    /// Returns `true` if the message deploys a contract.
    pub const fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// Returns `true` if the message carries blobs.
    pub fn has_blobs(&self) -> bool {
        !self.blob_hashes.is_empty() || self.blob_gas_fee_cap.is_some()
    }
}
