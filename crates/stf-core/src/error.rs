//! Error types of the state transition.
//!
//! Errors are split by how far they propagate: [`InvalidTransaction`] is caught at the
//! transaction boundary and turned into a rejection record, while [`BlockExecutionError`]
//! aborts the whole block.

use alloy_primitives::{Address, BlockNumber, TxHash, B256, U256};

use crate::gas_pool::GasPoolError;

/// Reason a transaction is rejected. A rejected transaction consumes no gas and leaves no
/// trace in the state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTransaction {
    /// The transaction input could not be decoded or signed.
    #[error("malformed transaction: {0}")]
    Malformed(String),
    /// A blob transaction in a block without blob gas context.
    #[error("blob tx used but field env.ExcessBlobGas missing")]
    MissingBlobGasContext,
    /// The transaction type is not active yet.
    #[error("transaction type {0} not supported")]
    TxTypeNotSupported(u8),
    /// The signature is invalid or does not recover to a sender.
    #[error("invalid transaction signature: {0}")]
    InvalidSignature(String),
    /// The transaction is signed for another chain.
    #[error("invalid chain id for signer: have {have} want {want}")]
    InvalidChainId {
        /// Chain id of the transaction.
        have: u64,
        /// Chain id of the block.
        want: u64,
    },
    /// Nonce below the sender's account nonce.
    #[error("nonce too low: address {address}, tx: {tx} state: {state}")]
    NonceTooLow {
        /// Sender.
        address: Address,
        /// Nonce of the transaction.
        tx: u64,
        /// Nonce of the sender account.
        state: u64,
    },
    /// Nonce above the sender's account nonce.
    #[error("nonce too high: address {address}, tx: {tx} state: {state}")]
    NonceTooHigh {
        /// Sender.
        address: Address,
        /// Nonce of the transaction.
        tx: u64,
        /// Nonce of the sender account.
        state: u64,
    },
    /// The sender's nonce cannot be incremented any further.
    #[error("nonce has max value: address {address}, nonce: {nonce}")]
    NonceMax {
        /// Sender.
        address: Address,
        /// Nonce of the sender account.
        nonce: u64,
    },
    /// The sender has code deployed.
    #[error("sender not an eoa: address {address}, codehash: {code_hash}")]
    SenderNoEoa {
        /// Sender.
        address: Address,
        /// Code hash of the sender account.
        code_hash: B256,
    },
    /// Priority fee above the fee cap.
    #[error("max priority fee per gas higher than max fee per gas: address {address}, maxPriorityFeePerGas: {tip}, maxFeePerGas: {fee_cap}")]
    TipAboveFeeCap {
        /// Sender.
        address: Address,
        /// Priority fee cap.
        tip: u128,
        /// Fee cap.
        fee_cap: u128,
    },
    /// Fee cap below the base fee of the block.
    #[error("max fee per gas less than block base fee: address {address}, maxFeePerGas: {fee_cap}, baseFee: {base_fee}")]
    FeeCapTooLow {
        /// Sender.
        address: Address,
        /// Fee cap.
        fee_cap: u128,
        /// Base fee of the block.
        base_fee: u64,
    },
    /// A blob transaction without blob hashes.
    #[error("blob transaction missing blob hashes")]
    MissingBlobHashes,
    /// A blob hash with an unknown version byte.
    #[error("blob {index} hash version mismatch (have {version}, supported 1)")]
    InvalidBlobHashVersion {
        /// Position of the hash in the transaction.
        index: usize,
        /// Version byte of the hash.
        version: u8,
    },
    /// Blob fee cap below the blob gas price of the block.
    #[error("max fee per blob gas less than block blob gas fee: address {address} blobGasFeeCap: {fee_cap}, blobBaseFee: {price}")]
    BlobFeeCapTooLow {
        /// Sender.
        address: Address,
        /// Blob fee cap.
        fee_cap: u128,
        /// Blob gas price of the block.
        price: U256,
    },
    /// The sender cannot pay for the gas and value.
    #[error("insufficient funds for gas * price + value: address {address} have {have} want {want}")]
    InsufficientFunds {
        /// Sender.
        address: Address,
        /// Balance of the sender.
        have: U256,
        /// Required balance.
        want: U256,
    },
    /// The sender cannot pay for the value after buying gas.
    #[error("insufficient funds for transfer: address {0}")]
    InsufficientFundsForTransfer(Address),
    /// The block has no room for the transaction.
    #[error(transparent)]
    GasPool(#[from] GasPoolError),
    /// Gas limit below the intrinsic gas.
    #[error("intrinsic gas too low: have {have}, want {want}")]
    IntrinsicGas {
        /// Gas limit of the transaction.
        have: u64,
        /// Intrinsic gas of the transaction.
        want: u64,
    },
    /// Intrinsic gas computation overflowed.
    #[error("gas uint64 overflow")]
    GasUintOverflow,
    /// Initcode above the EIP-3860 limit.
    #[error("max initcode size exceeded: code size {size} limit {limit}")]
    MaxInitCodeSizeExceeded {
        /// Size of the initcode.
        size: usize,
        /// Maximum initcode size.
        limit: usize,
    },
}

/// Error aborting the execution of a whole block.
#[derive(Debug, thiserror::Error)]
pub enum BlockExecutionError {
    /// A transaction requested the hash of a block missing from the environment.
    #[error("tx {index} ({hash}) requested hash of block {number}, which is not available")]
    MissingBlockhash {
        /// Index of the transaction in the block.
        index: usize,
        /// Hash of the transaction.
        hash: TxHash,
        /// Requested block number.
        number: BlockNumber,
    },
    /// Committing the state failed.
    #[error("could not commit state: {0}")]
    State(#[from] StateError),
    /// Advancing the storage format conversion failed.
    #[error("could not advance format conversion: {0}")]
    Transition(#[from] TransitionError),
    /// Producing the witness proof failed.
    #[error("could not generate witness proof: {0}")]
    Witness(#[from] WitnessError),
}

/// Error of the state collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Reopening at a root that differs from the committed one.
    #[error("state root mismatch: have {have}, want {want}")]
    RootMismatch {
        /// Root of the committed state.
        have: B256,
        /// Requested root.
        want: B256,
    },
    /// Leaves of the new layout were supplied while the layout is not active.
    #[error("new-layout leaves supplied for a legacy-only state")]
    UnexpectedTreeLeaves,
}

/// Error advancing the storage format conversion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Advancing before the conversion was started.
    #[error("format conversion not started")]
    NotStarted,
    /// The state has no new-layout tree to migrate into.
    #[error("new storage layout not active")]
    LayoutInactive,
    /// A slot cursor without an account cursor.
    #[error("slot cursor {0} set without an account cursor")]
    DanglingSlotCursor(B256),
}

/// Error producing the witness proof.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WitnessError {
    /// No pre-block tree to prove against.
    #[error("missing pre-block tree")]
    MissingPreTree,
    /// The committed state has no new-layout tree.
    #[error("missing post-block tree")]
    MissingPostTree,
    /// No key was touched.
    #[error("no keys to prove")]
    NoKeys,
}
