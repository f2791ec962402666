use std::collections::BTreeMap;

use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{keccak256, Bloom, B256, U256};
use tracing::debug;

use super::{
    apply::{BlockTransaction, TransactionApplier},
    message::EthMessageExecutor,
    rewards::{apply_dao_fork, apply_rewards, apply_withdrawals},
};
use crate::{
    chain::ChainConfig,
    constants::{
        eip4844::MAX_BLOB_GAS_PER_BLOCK,
        stateless::{HISTORY_SERVE_WINDOW, HISTORY_STORAGE_ADDRESS, PARENT_HASHES_PER_BLOCK},
    },
    env::{BlockContext, BlockEnv},
    error::{BlockExecutionError, StateError, WitnessError},
    gas_pool::GasPool,
    interfaces::{MessageExecutor, StateDb, WitnessProver},
    result::ExecutionResult,
    root::ordered_trie_root,
    state::{Alloc, MemoryState, PreState},
    witness::TrieWitnessProver,
};

/// Executes whole blocks: irregular state changes, transactions, rewards, withdrawals, the
/// storage format conversion and the commitment of the result.
#[derive(Debug, Clone)]
pub struct TransitionExecutor<E = EthMessageExecutor, P = TrieWitnessProver> {
    chain: ChainConfig,
    block_reward: Option<U256>,
    executor: E,
    prover: P,
}

impl TransitionExecutor {
    /// Creates an executor for `chain` that pays no block reward, runs no code and proves with
    /// [`TrieWitnessProver`].
    pub const fn new(chain: ChainConfig) -> Self {
        Self {
            chain,
            block_reward: None,
            executor: EthMessageExecutor::new(),
            prover: TrieWitnessProver,
        }
    }
}

impl<E, P> TransitionExecutor<E, P> {
    /// Replaces the message executor.
    pub fn with_executor<T>(self, executor: T) -> TransitionExecutor<T, P> {
        TransitionExecutor {
            chain: self.chain,
            block_reward: self.block_reward,
            executor,
            prover: self.prover,
        }
    }

    /// Replaces the witness prover.
    pub fn with_prover<T>(self, prover: T) -> TransitionExecutor<E, T> {
        TransitionExecutor {
            chain: self.chain,
            block_reward: self.block_reward,
            executor: self.executor,
            prover,
        }
    }

    /// Sets the block reward. `None` disables rewards entirely, while a zero reward still
    /// touches the block producer.
    pub fn with_block_reward(mut self, block_reward: Option<U256>) -> Self {
        self.block_reward = block_reward;
        self
    }

    /// Returns the chain configuration.
    pub const fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    /// Builds the in-memory pre-state of the block described by `env`.
    ///
    /// When the new storage format is active for the block, `alloc` is the legacy state the
    /// conversion reads from, `tree_leaves` the already converted state, and the conversion is
    /// started if it has not been yet.
    pub fn pre_state(
        &self,
        env: &BlockEnv,
        alloc: Alloc,
        tree_leaves: Option<BTreeMap<B256, B256>>,
    ) -> Result<MemoryState, StateError> {
        MemoryState::from_pre_state(PreState {
            alloc,
            tree_leaves,
            stateless: self.chain.rules(env.number, env.timestamp).is_stateless,
            transition: env.transition,
        })
    }

    /// Executes the block described by `env` with the transactions `txs` on top of `state`.
    ///
    /// On success the state is committed and reopened at the new root, ready for the next
    /// block. On error the block is invalid and the state must be discarded.
    pub fn execute<S>(
        &mut self,
        state: &mut S,
        env: &BlockEnv,
        txs: &[BlockTransaction],
    ) -> Result<ExecutionResult, BlockExecutionError>
    where
        S: StateDb,
        E: MessageExecutor<S>,
        P: WitnessProver,
    {
        let ctx = BlockContext::new(&self.chain, env);
        let rules = ctx.rules;
        debug!(number = env.number, txs = txs.len(), ?rules, "Executing block");

        let mut pool = GasPool::new(ctx.gas_limit);
        if rules.is_cancun {
            pool.add_blob_gas(MAX_BLOB_GAS_PER_BLOCK);
        }
        let pre_tree = if rules.is_stateless { state.stem_tree().cloned() } else { None };

        if self.chain.dao_fork_block() == Some(env.number) {
            apply_dao_fork(state, &self.chain.dao_drain_accounts, self.chain.dao_refund_contract);
        }
        if rules.is_stateless {
            store_parent_hashes(state, &ctx);
        }

        let mut applier = TransactionApplier::new();
        for (index, tx) in txs.iter().enumerate() {
            applier.apply(state, &mut self.executor, &ctx, &mut pool, index, tx)?;
        }
        state.intermediate_root(rules.is_eip158);

        if let Some(block_reward) = self.block_reward {
            apply_rewards(state, env.coinbase, &env.ommers, block_reward);
        }
        if let Some(withdrawals) = &env.withdrawals {
            apply_withdrawals(state, withdrawals);
        }
        if rules.is_stateless {
            state.advance_transition(self.chain.overlay_stride)?;
        }

        let state_root = state.commit(env.number, rules.is_eip158)?;

        let witness = if rules.is_stateless {
            let keys = state.witness_keys();
            if keys.is_empty() {
                None
            } else {
                let pre = pre_tree.as_ref().ok_or(WitnessError::MissingPreTree)?;
                let post = state.stem_tree().ok_or(WitnessError::MissingPostTree)?;
                Some(self.prover.prove(pre, post, &keys)?)
            }
        } else {
            None
        };

        let logs = state.all_logs();
        let mut logs_bloom = Bloom::default();
        for receipt in &applier.receipts {
            logs_bloom.accrue_bloom(&receipt.logs_bloom);
        }
        let result = ExecutionResult {
            state_root,
            tx_root: ordered_trie_root(&applier.included, |tx| tx.encoded_2718()),
            receipts_root: ordered_trie_root(&applier.receipts, |receipt| {
                receipt.to_envelope().encoded_2718()
            }),
            logs_hash: keccak256(alloy_rlp::encode(&logs)),
            logs_bloom,
            receipts: applier.receipts,
            rejected: applier.rejected,
            difficulty: (!rules.is_merge).then_some(ctx.difficulty),
            gas_used: applier.gas_used,
            base_fee: ctx.base_fee,
            withdrawals_root: env
                .withdrawals
                .as_ref()
                .map(|withdrawals| ordered_trie_root(withdrawals, |w| alloy_rlp::encode(w))),
            excess_blob_gas: ctx.excess_blob_gas,
            blob_gas_used: ctx.excess_blob_gas.map(|_| applier.blob_gas_used),
            witness,
            transition_status: rules.is_stateless.then(|| state.transition().status()),
        };

        state.reopen(state_root)?;
        debug!(
            number = env.number,
            %state_root,
            gas_used = result.gas_used,
            rejected = result.rejected.len(),
            "Executed block"
        );
        Ok(result)
    }
}

/// Writes the hashes of the parent blocks into the history storage account, keyed by block
/// number modulo the serve window. Hashes the environment does not know are skipped.
fn store_parent_hashes<S: StateDb>(state: &mut S, ctx: &BlockContext) {
    let first = ctx.number.saturating_sub(PARENT_HASHES_PER_BLOCK).max(1);
    for number in first..ctx.number {
        let Some(hash) = ctx.block_hashes.known(number) else { continue };
        let slot = U256::from(number % HISTORY_SERVE_WINDOW);
        state.set_storage(HISTORY_STORAGE_ADDRESS, slot, hash.into());
    }
}
