//! Transaction type definitions for the t8n tool.

use alloy_consensus::{
    SignableTransaction, Signed, TxEip1559, TxEip2930, TxEip4844, TxEnvelope, TxLegacy,
};
use alloy_eips::eip2930::AccessList;
use alloy_primitives::{Address, Bytes, ChainId, Signature, TxKind, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use serde::Deserialize;

/// Error type for transaction conversion failures
#[derive(Debug, thiserror::Error)]
pub enum TransactionConversionError {
    /// Unsupported transaction type
    #[error("Unsupported transaction type: {0}")]
    UnsupportedType(u8),
    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    /// Invalid signature components or secret key
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

/// Transaction data for t8n: either signed with `(v, r, s)` or carrying the `secretKey` to sign
/// it with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction type (0=Legacy, 1=EIP-2930, 2=EIP-1559, 3=EIP-4844)
    #[serde(rename = "type", default, with = "alloy_serde::quantity::opt")]
    pub tx_type: Option<u8>,
    /// Chain ID
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub chain_id: Option<ChainId>,
    /// Transaction nonce
    #[serde(default, with = "alloy_serde::quantity")]
    pub nonce: u64,
    /// Gas price (legacy/EIP-2930)
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub gas_price: Option<u128>,
    /// Maximum fee per gas (EIP-1559)
    #[serde(default, alias = "gasFeeCap", with = "alloy_serde::quantity::opt")]
    pub max_fee_per_gas: Option<u128>,
    /// Maximum priority fee per gas (EIP-1559)
    #[serde(default, alias = "gasTipCap", with = "alloy_serde::quantity::opt")]
    pub max_priority_fee_per_gas: Option<u128>,
    /// Gas limit
    #[serde(default, with = "alloy_serde::quantity")]
    pub gas: u64,
    /// Recipient address (None for contract creation)
    #[serde(default)]
    pub to: Option<Address>,
    /// Ether value to transfer
    #[serde(default)]
    pub value: U256,
    /// Transaction data/input
    #[serde(default, alias = "data")]
    pub input: Bytes,
    /// Access list (EIP-2930, EIP-1559, EIP-4844)
    #[serde(default)]
    pub access_list: Option<AccessList>,
    /// Maximum fee per blob gas (EIP-4844)
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub max_fee_per_blob_gas: Option<u128>,
    /// Blob versioned hashes (EIP-4844)
    #[serde(default)]
    pub blob_versioned_hashes: Vec<B256>,
    /// Signature v component
    #[serde(default)]
    pub v: U256,
    /// Signature r component
    #[serde(default)]
    pub r: U256,
    /// Signature s component
    #[serde(default)]
    pub s: U256,
    /// Secret key to sign with, replacing the signature
    #[serde(default)]
    pub secret_key: Option<B256>,
    /// Whether a legacy transaction signed with `secretKey` is replay protected (EIP-155)
    #[serde(default = "default_protected")]
    pub protected: bool,
}

const fn default_protected() -> bool {
    true
}

impl Transaction {
    /// Converts into a signed envelope. `chain_id` is used where the transaction omits one.
    pub fn to_envelope(&self, chain_id: ChainId) -> Result<TxEnvelope, TransactionConversionError> {
        let kind = self.to.map_or(TxKind::Create, TxKind::Call);
        let access_list = self.access_list.clone().unwrap_or_default();

        match self.tx_type.unwrap_or(0) {
            0 => self.seal(TxLegacy {
                chain_id: self.legacy_chain_id(chain_id)?,
                nonce: self.nonce,
                gas_price: self.gas_price.ok_or(TransactionConversionError::MissingField("gasPrice"))?,
                gas_limit: self.gas,
                to: kind,
                value: self.value,
                input: self.input.clone(),
            }),
            1 => self.seal(TxEip2930 {
                chain_id: self.chain_id.unwrap_or(chain_id),
                nonce: self.nonce,
                gas_price: self.gas_price.ok_or(TransactionConversionError::MissingField("gasPrice"))?,
                gas_limit: self.gas,
                to: kind,
                value: self.value,
                access_list,
                input: self.input.clone(),
            }),
            2 => self.seal(TxEip1559 {
                chain_id: self.chain_id.unwrap_or(chain_id),
                nonce: self.nonce,
                gas_limit: self.gas,
                max_fee_per_gas: self.max_fee_per_gas()?,
                max_priority_fee_per_gas: self.max_priority_fee_per_gas()?,
                to: kind,
                value: self.value,
                access_list,
                input: self.input.clone(),
            }),
            3 => self.seal(TxEip4844 {
                chain_id: self.chain_id.unwrap_or(chain_id),
                nonce: self.nonce,
                gas_limit: self.gas,
                max_fee_per_gas: self.max_fee_per_gas()?,
                max_priority_fee_per_gas: self.max_priority_fee_per_gas()?,
                to: self.to.ok_or(TransactionConversionError::MissingField("to"))?,
                value: self.value,
                access_list,
                blob_versioned_hashes: self.blob_versioned_hashes.clone(),
                max_fee_per_blob_gas: self
                    .max_fee_per_blob_gas
                    .ok_or(TransactionConversionError::MissingField("maxFeePerBlobGas"))?,
                input: self.input.clone(),
            }),
            tx_type => Err(TransactionConversionError::UnsupportedType(tx_type)),
        }
    }

    fn max_fee_per_gas(&self) -> Result<u128, TransactionConversionError> {
        self.max_fee_per_gas.ok_or(TransactionConversionError::MissingField("maxFeePerGas"))
    }

    fn max_priority_fee_per_gas(&self) -> Result<u128, TransactionConversionError> {
        self.max_priority_fee_per_gas
            .ok_or(TransactionConversionError::MissingField("maxPriorityFeePerGas"))
    }

    /// Chain id of a legacy transaction: the configured one when signing with a secret key,
    /// else the one encoded in `v` (EIP-155).
    fn legacy_chain_id(&self, chain_id: ChainId) -> Result<Option<ChainId>, TransactionConversionError> {
        if self.secret_key.is_some() {
            return Ok(self.protected.then(|| self.chain_id.unwrap_or(chain_id)));
        }
        match self.v() {
            27 | 28 => Ok(None),
            v if v >= 35 => Ok(Some((v - 35) / 2)),
            v => Err(TransactionConversionError::InvalidSignature(format!("invalid legacy v: {v}"))),
        }
    }

    fn v(&self) -> u64 {
        self.v.saturating_to()
    }

    /// Parity of the signature: from `27 + parity` or `35 + 2 * chain_id + parity` for legacy
    /// transactions, the plain parity for typed ones.
    fn y_parity(&self) -> Result<bool, TransactionConversionError> {
        let v = self.v();
        match self.tx_type.unwrap_or(0) {
            0 if v >= 35 => Ok((v - 35) % 2 == 1),
            0 => Ok(v == 28),
            _ if v <= 1 => Ok(v == 1),
            _ => Err(TransactionConversionError::InvalidSignature(format!("invalid y parity: {v}"))),
        }
    }

    fn seal<T>(&self, tx: T) -> Result<TxEnvelope, TransactionConversionError>
    where
        T: SignableTransaction<Signature>,
        Signed<T>: Into<TxEnvelope>,
    {
        let signature = match self.secret_key {
            Some(key) => PrivateKeySigner::from_bytes(&key)
                .map_err(|err| TransactionConversionError::InvalidSignature(err.to_string()))?
                .sign_hash_sync(&tx.signature_hash())
                .map_err(|err| TransactionConversionError::InvalidSignature(err.to_string()))?,
            None => Signature::new(self.r, self.s, self.y_parity()?),
        };
        Ok(tx.into_signed(signature).into())
    }
}

#[cfg(test)]
mod tests {
    use alloy_consensus::{transaction::SignerRecoverable, Transaction as _};
    use alloy_eips::Typed2718;
    use rstest::rstest;
    use stf_core::test_utils::{sign_legacy, TestSigner};

    use super::*;

    fn parse(json: &str) -> Transaction {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_secret_key_signing() {
        let tx = parse(
            r#"{
                "type": "0x2",
                "nonce": "0x1",
                "maxFeePerGas": "0x10",
                "maxPriorityFeePerGas": "0x1",
                "gas": "0x5208",
                "to": "0x0000000000000000000000000000000000000b0b",
                "value": "0x1",
                "input": "0x",
                "secretKey": "0x0000000000000000000000000000000000000000000000000000000000000001"
            }"#,
        );
        let envelope = tx.to_envelope(7).unwrap();
        assert_eq!(envelope.ty(), 2);
        assert_eq!(envelope.chain_id(), Some(7));
        assert_eq!(envelope.recover_signer().unwrap(), TestSigner::from_seed(1).address());
    }

    #[test]
    fn test_legacy_signature_roundtrip() {
        let signer = TestSigner::from_seed(2);
        let signed = sign_legacy(
            TxLegacy {
                chain_id: Some(1),
                nonce: 4,
                gas_price: 10,
                gas_limit: 21_000,
                to: TxKind::Call(Address::with_last_byte(1)),
                value: U256::from(3),
                input: Bytes::new(),
            },
            &signer,
        );
        let TxEnvelope::Legacy(legacy) = &signed else { panic!("expected legacy") };
        let signature = legacy.signature();
        let tx = Transaction {
            tx_type: None,
            chain_id: None,
            nonce: 4,
            gas_price: Some(10),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            gas: 21_000,
            to: Some(Address::with_last_byte(1)),
            value: U256::from(3),
            input: Bytes::new(),
            access_list: None,
            max_fee_per_blob_gas: None,
            blob_versioned_hashes: Vec::new(),
            // EIP-155: 35 + 2 * chain_id + parity
            v: U256::from(37 + u64::from(signature.v())),
            r: signature.r(),
            s: signature.s(),
            secret_key: None,
            protected: true,
        };

        let envelope = tx.to_envelope(99).unwrap();
        assert_eq!(envelope.tx_hash(), signed.tx_hash());
        assert_eq!(envelope.recover_signer().unwrap(), signer.address());
    }

    #[test]
    fn test_unprotected_legacy() {
        let tx = parse(
            r#"{
                "gasPrice": "0x1",
                "gas": "0x5208",
                "secretKey": "0x0000000000000000000000000000000000000000000000000000000000000001",
                "protected": false
            }"#,
        );
        assert_eq!(tx.to_envelope(1).unwrap().chain_id(), None);
    }

    #[rstest]
    #[case::unsupported(r#"{"type": "0x4"}"#, "Unsupported transaction type: 4")]
    #[case::missing_gas_price(r#"{"type": "0x1"}"#, "Missing required field: gasPrice")]
    #[case::blob_create(
        r#"{"type": "0x3", "maxFeePerGas": "0x1", "maxPriorityFeePerGas": "0x1", "maxFeePerBlobGas": "0x1"}"#,
        "Missing required field: to"
    )]
    #[case::bad_parity(r#"{"type": "0x2", "maxFeePerGas": "0x1", "maxPriorityFeePerGas": "0x1", "v": "0x1b"}"#, "Invalid signature: invalid y parity: 27")]
    fn test_conversion_errors(#[case] json: &str, #[case] want: &str) {
        assert_eq!(parse(json).to_envelope(1).unwrap_err().to_string(), want);
    }
}
