//! Protocol constants used by the state transition.
//!
//! Constants are grouped by the protocol upgrade that introduced them.

/// Constants of the original (Frontier) transaction pricing.
pub mod frontier {
    /// Intrinsic gas of every transaction.
    pub const TX_GAS: u64 = 21_000;
    /// Gas per zero byte of calldata.
    pub const TX_DATA_ZERO_GAS: u64 = 4;
    /// Gas per non-zero byte of calldata before EIP-2028.
    pub const TX_DATA_NON_ZERO_GAS: u64 = 68;
    /// Maximum fraction of the used gas that can be refunded before EIP-3529.
    pub const REFUND_QUOTIENT: u64 = 2;
    /// Gas per byte of deployed contract code.
    pub const CREATE_DATA_GAS: u64 = 200;
    /// Number of most recent block hashes reachable by the `BLOCKHASH` opcode.
    pub const BLOCK_HASH_WINDOW: u64 = 256;
}

/// Constants introduced in Homestead.
pub mod homestead {
    /// Intrinsic gas of a contract-creation transaction (EIP-2).
    pub const TX_GAS_CONTRACT_CREATION: u64 = 53_000;
}

/// Constants of the DAO hard fork irregular state change.
pub mod dao {
    use alloy_primitives::{address, Address};

    /// Account receiving the balances drained at the DAO fork block.
    pub const REFUND_CONTRACT: Address = address!("0xbf4ed7b27f1d666546e30d74d50d173d20bca754");
}

/// Constants introduced in Istanbul.
pub mod istanbul {
    /// Gas per non-zero byte of calldata (EIP-2028).
    pub const TX_DATA_NON_ZERO_GAS: u64 = 16;
}

/// Constants introduced in Berlin.
pub mod berlin {
    /// Gas per address in an access list (EIP-2930).
    pub const TX_ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;
    /// Gas per storage key in an access list (EIP-2930).
    pub const TX_ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;
}

/// Constants introduced in London.
pub mod london {
    /// Maximum fraction of the used gas that can be refunded (EIP-3529).
    pub const REFUND_QUOTIENT: u64 = 5;
    /// Base fee of the first London block (EIP-1559).
    pub const INITIAL_BASE_FEE: u64 = 1_000_000_000;
    /// First byte rejected for newly deployed code (EIP-3541).
    pub const RESERVED_CODE_PREFIX: u8 = 0xef;
}

/// Constants introduced in Spurious Dragon.
pub mod spurious_dragon {
    /// Maximum deployed code size (EIP-170).
    pub const MAX_CODE_SIZE: usize = 24_576;
}

/// Constants introduced in Shanghai.
pub mod shanghai {
    /// Maximum initcode size (EIP-3860).
    pub const MAX_INITCODE_SIZE: usize = 2 * super::spurious_dragon::MAX_CODE_SIZE;
    /// Gas per 32-byte word of initcode (EIP-3860).
    pub const INITCODE_WORD_GAS: u64 = 2;
    /// Conversion factor of withdrawal amounts, which are denominated in gwei (EIP-4895).
    pub const GWEI_TO_WEI: u64 = 1_000_000_000;
}

/// Constants of the blob-gas fee market (EIP-4844).
pub mod eip4844 {
    /// Blob gas consumed by a single blob.
    pub const GAS_PER_BLOB: u64 = 1 << 17;
    /// Target blob gas per block, three blobs.
    pub const TARGET_BLOB_GAS_PER_BLOCK: u64 = 3 * GAS_PER_BLOB;
    /// Maximum blob gas per block, six blobs.
    pub const MAX_BLOB_GAS_PER_BLOCK: u64 = 6 * GAS_PER_BLOB;
    /// Minimum price of a unit of blob gas, in wei.
    pub const MIN_BLOB_GASPRICE: u64 = 1;
    /// Controls the maximum rate of change of the blob gas price.
    pub const BLOB_GASPRICE_UPDATE_FRACTION: u64 = 3_338_477;
    /// Version byte of a KZG commitment versioned hash.
    pub const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;
}

/// Constants of the stateless era (new storage format and in-state block history).
pub mod stateless {
    pub use alloy_eips::eip2935::HISTORY_STORAGE_ADDRESS;

    /// Number of slots of the history storage ring buffer.
    pub const HISTORY_SERVE_WINDOW: u64 = 8191;
    /// Number of parent block hashes written into the history account per block: block `N`
    /// stores the hashes of `N-257` through `N-1`, one more than `BLOCKHASH` can reach.
    pub const PARENT_HASHES_PER_BLOCK: u64 = super::frontier::BLOCK_HASH_WINDOW + 1;
    /// Default number of legacy leaves migrated to the new format per block.
    pub const DEFAULT_OVERLAY_STRIDE: u64 = 10_000;
}
