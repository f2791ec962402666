//! Blob-gas market of EIP-4844: excess blob gas, blob gas price and header validation.

use alloy_consensus::{Header, Transaction, TxEnvelope};
use alloy_primitives::{BlockNumber, B256, U256};
use auto_impl::auto_impl;

use crate::{
    chain::ChainConfig,
    constants::eip4844::{
        BLOB_GASPRICE_UPDATE_FRACTION, GAS_PER_BLOB, MAX_BLOB_GAS_PER_BLOCK, MIN_BLOB_GASPRICE,
        TARGET_BLOB_GAS_PER_BLOCK,
    },
};

/// Error returned by blob-gas header validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobGasError {
    /// A Cancun header without the excess blob gas field.
    #[error("header is missing excessBlobGas")]
    MissingExcessBlobGas,
    /// A Cancun header without the blob gas used field.
    #[error("header is missing blobGasUsed")]
    MissingBlobGasUsed,
    /// A pre-Cancun header carrying the excess blob gas field.
    #[error("unexpected excessBlobGas in header")]
    UnexpectedExcessBlobGas,
    /// A pre-Cancun header carrying the blob gas used field.
    #[error("unexpected blobGasUsed in header")]
    UnexpectedBlobGasUsed,
    /// Blob gas used is above the per-block maximum.
    #[error("blob gas used {have} exceeds maximum allowance {max}")]
    BlobGasUsedExceedsMaximum {
        /// Value carried by the header.
        have: u64,
        /// Per-block maximum.
        max: u64,
    },
    /// Blob gas used is not a whole number of blobs.
    #[error("blob gas used {0} not a multiple of blob gas per blob {GAS_PER_BLOB}")]
    BlobGasUsedNotMultipleOfBlobGas(u64),
    /// Excess blob gas does not follow from the parent header.
    #[error("invalid excessBlobGas: have {have}, want {want}, parentExcessBlobGas {parent_excess}, parentBlobGasUsed {parent_used}")]
    InvalidExcessBlobGas {
        /// Value carried by the header.
        have: u64,
        /// Value derived from the parent.
        want: u64,
        /// Excess blob gas of the parent.
        parent_excess: u64,
        /// Blob gas used by the parent.
        parent_used: u64,
    },
    /// The parent header could not be found.
    #[error("parent block not found")]
    ParentNotFound,
}

/// Read access to the canonical chain needed to validate a header against its parent.
#[auto_impl(&, Box, Arc)]
pub trait HeaderReader {
    /// Returns the configuration of the chain.
    fn chain_config(&self) -> &ChainConfig;

    /// Returns the header with the given hash and number.
    fn header(&self, hash: B256, number: BlockNumber) -> Option<Header>;
}

/// Computes the excess blob gas of a block from its parent's excess and usage. Missing values
/// count as zero.
pub fn calc_excess_blob_gas(parent_excess: Option<u64>, parent_used: Option<u64>) -> u64 {
    let total = parent_excess.unwrap_or_default().saturating_add(parent_used.unwrap_or_default());
    total.saturating_sub(TARGET_BLOB_GAS_PER_BLOCK)
}

/// Returns the price of a unit of blob gas for the given excess blob gas.
pub fn blob_gas_price(excess_blob_gas: u64) -> U256 {
    fake_exponential(
        U256::from(MIN_BLOB_GASPRICE),
        U256::from(excess_blob_gas),
        U256::from(BLOB_GASPRICE_UPDATE_FRACTION),
    )
}

/// Approximates `factor * e ** (numerator / denominator)` with the integer Taylor expansion of
/// EIP-4844.
///
/// The result is exact as long as it stays below `2^170`. Larger prices saturate at
/// [`U256::MAX`], far above anything a sender can pay for.
pub fn fake_exponential(factor: U256, numerator: U256, denominator: U256) -> U256 {
    if denominator.is_zero() {
        return U256::MAX;
    }
    let mut output = U256::ZERO;
    let Some(mut accumulator) = factor.checked_mul(denominator) else {
        return U256::MAX;
    };
    let mut i = U256::from(1);
    while !accumulator.is_zero() {
        output = output.saturating_add(accumulator);
        let Some(scaled) = accumulator.checked_mul(numerator) else {
            return U256::MAX;
        };
        accumulator = scaled / denominator.saturating_mul(i);
        i += U256::from(1);
    }
    output / denominator
}

/// Returns the blob gas consumed by `blobs` blobs.
pub const fn blob_gas_used(blobs: u64) -> u64 {
    blobs.saturating_mul(GAS_PER_BLOB)
}

/// Counts the blobs referenced by `transactions`.
pub fn count_blobs<'a>(transactions: impl IntoIterator<Item = &'a TxEnvelope>) -> usize {
    transactions
        .into_iter()
        .map(|tx| tx.blob_versioned_hashes().map_or(0, <[B256]>::len))
        .sum()
}

/// Checks that the blob gas fields of `header` are present, within bounds and consistent with
/// `parent`. The caller is responsible for only calling this for Cancun headers.
pub fn verify_eip4844_header(parent: &Header, header: &Header) -> Result<(), BlobGasError> {
    let excess = header.excess_blob_gas.ok_or(BlobGasError::MissingExcessBlobGas)?;
    let used = header.blob_gas_used.ok_or(BlobGasError::MissingBlobGasUsed)?;

    if used > MAX_BLOB_GAS_PER_BLOCK {
        return Err(BlobGasError::BlobGasUsedExceedsMaximum {
            have: used,
            max: MAX_BLOB_GAS_PER_BLOCK,
        });
    }
    if used % GAS_PER_BLOB != 0 {
        return Err(BlobGasError::BlobGasUsedNotMultipleOfBlobGas(used));
    }

    check_excess(excess, parent.excess_blob_gas, parent.blob_gas_used)
}

/// Checks the excess blob gas of `header` against its parent, looked up through `reader`.
///
/// Before Cancun the header must carry neither blob gas field. From Cancun on both are required.
pub fn verify_excess_blob_gas<R: HeaderReader>(
    reader: &R,
    header: &Header,
) -> Result<(), BlobGasError> {
    if !reader.chain_config().rules(header.number, header.timestamp).is_cancun {
        if header.excess_blob_gas.is_some() {
            return Err(BlobGasError::UnexpectedExcessBlobGas);
        }
        if header.blob_gas_used.is_some() {
            return Err(BlobGasError::UnexpectedBlobGasUsed);
        }
        return Ok(());
    }
    let excess = header.excess_blob_gas.ok_or(BlobGasError::MissingExcessBlobGas)?;
    header.blob_gas_used.ok_or(BlobGasError::MissingBlobGasUsed)?;
    let parent = reader
        .header(header.parent_hash, header.number.saturating_sub(1))
        .ok_or(BlobGasError::ParentNotFound)?;
    check_excess(excess, parent.excess_blob_gas, parent.blob_gas_used)
}

fn check_excess(
    have: u64,
    parent_excess: Option<u64>,
    parent_used: Option<u64>,
) -> Result<(), BlobGasError> {
    let want = calc_excess_blob_gas(parent_excess, parent_used);
    if have != want {
        return Err(BlobGasError::InvalidExcessBlobGas {
            have,
            want,
            parent_excess: parent_excess.unwrap_or_default(),
            parent_used: parent_used.unwrap_or_default(),
        });
    }
    Ok(())
}
