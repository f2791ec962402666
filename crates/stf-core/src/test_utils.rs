//! Helpers to sign transactions with throwaway keys.

use alloy_consensus::{
    SignableTransaction, Signed, TxEip1559, TxEip2930, TxEip4844, TxEnvelope, TxLegacy,
};
use alloy_primitives::{Address, Signature, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;

/// A signer whose key is derived from a single byte.
#[derive(Debug, Clone)]
pub struct TestSigner(PrivateKeySigner);

impl TestSigner {
    /// Creates the signer with private key `seed` as a big-endian integer. `seed` must not be 0.
    pub fn from_seed(seed: u8) -> Self {
        Self(PrivateKeySigner::from_bytes(&B256::with_last_byte(seed)).expect("valid private key"))
    }

    /// Address of the signer.
    pub fn address(&self) -> Address {
        self.0.address()
    }

    /// The underlying signer.
    pub const fn inner(&self) -> &PrivateKeySigner {
        &self.0
    }
}

fn sign<T>(tx: T, signer: &TestSigner) -> TxEnvelope
where
    T: SignableTransaction<Signature>,
    Signed<T>: Into<TxEnvelope>,
{
    let signature = signer.0.sign_hash_sync(&tx.signature_hash()).expect("signing succeeds");
    tx.into_signed(signature).into()
}

/// Signs a legacy transaction.
pub fn sign_legacy(tx: TxLegacy, signer: &TestSigner) -> TxEnvelope {
    sign(tx, signer)
}

/// Signs an access list transaction.
pub fn sign_eip2930(tx: TxEip2930, signer: &TestSigner) -> TxEnvelope {
    sign(tx, signer)
}

/// Signs a dynamic fee transaction.
pub fn sign_eip1559(tx: TxEip1559, signer: &TestSigner) -> TxEnvelope {
    sign(tx, signer)
}

/// Signs a blob transaction, without sidecar.
pub fn sign_eip4844(tx: TxEip4844, signer: &TestSigner) -> TxEnvelope {
    sign(tx, signer)
}
