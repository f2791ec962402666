//! Witness of the new-layout keys accessed by a block.

use alloy_primitives::{Bytes, B256};
use alloy_trie::{proof::ProofRetainer, HashBuilder, Nibbles};
use serde::{Deserialize, Serialize};

use crate::{error::WitnessError, interfaces::WitnessProver, state::StemTree};

/// Merkle proof of a set of keys against the pre-block tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitnessProof {
    /// Root of the tree before the block.
    pub pre_root: B256,
    /// Root of the tree after the block.
    pub post_root: B256,
    /// Trie nodes on the paths to the proven keys, ordered by path.
    pub nodes: Vec<Bytes>,
}

/// Value of one key before and after the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDiff {
    /// Leaf key.
    pub key: B256,
    /// Value before the block, `None` if absent.
    pub current_value: Option<B256>,
    /// Value after the block, `None` if absent.
    pub new_value: Option<B256>,
}

/// Per-key transition of the accessed keys.
pub type StateDiff = Vec<KeyDiff>;

/// Proof and state diff of a block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Witness {
    /// Proof against the pre-block tree.
    pub proof: WitnessProof,
    /// Transition of every proven key.
    pub state_diff: StateDiff,
}

/// [`WitnessProver`] retaining the trie nodes of the accessed keys while rebuilding the
/// pre-block root.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrieWitnessProver;

impl WitnessProver for TrieWitnessProver {
    fn prove(&self, pre: &StemTree, post: &StemTree, keys: &[B256]) -> Result<Witness, WitnessError> {
        if keys.is_empty() {
            return Err(WitnessError::NoKeys);
        }

        let targets = keys.iter().map(Nibbles::unpack).collect();
        let mut builder = HashBuilder::default().with_proof_retainer(ProofRetainer::new(targets));
        for (key, value) in pre.iter() {
            builder.add_leaf(Nibbles::unpack(key), value.as_slice());
        }
        let pre_root = builder.root();
        let nodes = builder
            .take_proof_nodes()
            .into_nodes_sorted()
            .into_iter()
            .map(|(_, node)| node)
            .collect();

        let state_diff = keys
            .iter()
            .map(|key| KeyDiff {
                key: *key,
                current_value: pre.get(key).copied(),
                new_value: post.get(key).copied(),
            })
            .collect();

        Ok(Witness {
            proof: WitnessProof { pre_root, post_root: post.root(), nodes },
            state_diff,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, U256};
    use alloy_trie::EMPTY_ROOT_HASH;

    use super::*;
    use crate::state::{account_leaf_keys, storage_leaf_key, AccountInfo};

    #[test]
    fn test_no_keys() {
        let tree = StemTree::default();
        assert_eq!(TrieWitnessProver.prove(&tree, &tree, &[]), Err(WitnessError::NoKeys));
    }

    #[test]
    fn test_proof_roots_and_diff() {
        let address = Address::with_last_byte(1);
        let mut pre = StemTree::default();
        pre.set_account(address, AccountInfo { nonce: 1, ..Default::default() });
        pre.set_storage(address, U256::from(1), U256::from(1));
        let mut post = pre.clone();
        post.set_storage(address, U256::from(1), U256::ZERO);
        post.set_storage(address, U256::from(2), U256::from(2));

        let keys = [storage_leaf_key(address, U256::from(1)), storage_leaf_key(address, U256::from(2))];
        let witness = TrieWitnessProver.prove(&pre, &post, &keys).unwrap();

        assert_eq!(witness.proof.pre_root, pre.root());
        assert_eq!(witness.proof.post_root, post.root());
        assert!(!witness.proof.nodes.is_empty());
        assert_eq!(
            witness.state_diff,
            vec![
                KeyDiff {
                    key: keys[0],
                    current_value: Some(U256::from(1).into()),
                    new_value: None,
                },
                KeyDiff { key: keys[1], current_value: None, new_value: Some(U256::from(2).into()) },
            ]
        );
    }

    #[test]
    fn test_empty_pre_tree() {
        let address = Address::with_last_byte(1);
        let mut post = StemTree::default();
        post.set_account(address, AccountInfo::default());
        let keys = account_leaf_keys(address);
        let witness = TrieWitnessProver.prove(&StemTree::default(), &post, &keys).unwrap();
        assert_eq!(witness.proof.pre_root, EMPTY_ROOT_HASH);
        assert!(witness.state_diff.iter().all(|diff| diff.current_value.is_none()));
        assert!(witness.state_diff.iter().all(|diff| diff.new_value.is_some()));
    }
}
