//! Merkle-Patricia roots over sorted leaves and over ordered lists.

use alloy_primitives::B256;
use alloy_trie::{HashBuilder, Nibbles};

/// Computes the root of the trie holding `leaves`, which must be sorted by key.
pub fn sorted_trie_root<K, V>(leaves: impl IntoIterator<Item = (K, V)>) -> B256
where
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let mut builder = HashBuilder::default();
    for (key, value) in leaves {
        builder.add_leaf(Nibbles::unpack(key), value.as_ref());
    }
    builder.root()
}

/// Computes the root of the trie mapping the RLP-encoded index of each item to its encoding,
/// as used for the transactions, receipts and withdrawals roots.
pub fn ordered_trie_root<T>(items: &[T], mut encode: impl FnMut(&T) -> Vec<u8>) -> B256 {
    let mut leaves: Vec<_> =
        items.iter().enumerate().map(|(index, item)| (alloy_rlp::encode(index), encode(item))).collect();
    leaves.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    sorted_trie_root(leaves)
}
