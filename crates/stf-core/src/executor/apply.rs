use alloy_consensus::TxEnvelope;
use alloy_eips::Typed2718;
use alloy_primitives::{Bloom, B256};
use tracing::{debug, warn};

use crate::{
    eip4844::blob_gas_used,
    env::BlockContext,
    error::{BlockExecutionError, InvalidTransaction},
    gas_pool::GasPool,
    interfaces::{MessageExecutor, StateDb},
    message::Message,
    result::{Receipt, RejectedTx},
};

/// A transaction as supplied to the block, possibly one that could not be decoded or signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockTransaction {
    /// A signed transaction.
    Signed(TxEnvelope),
    /// Input that does not form a valid signed transaction. Always rejected.
    Malformed {
        /// Why the input is invalid.
        reason: String,
    },
}

impl From<TxEnvelope> for BlockTransaction {
    fn from(tx: TxEnvelope) -> Self {
        Self::Signed(tx)
    }
}

/// Applies the transactions of a block one by one and accumulates their outcome.
///
/// A transaction is either included, with a receipt, or rejected, in which case the state and
/// both gas pool counters are exactly as before it.
#[derive(Debug, Default)]
pub struct TransactionApplier {
    /// Gas used by the included transactions.
    pub gas_used: u64,
    /// Blob gas used by the included transactions.
    pub blob_gas_used: u64,
    /// Included transactions, in order.
    pub included: Vec<TxEnvelope>,
    /// Receipts of the included transactions.
    pub receipts: Vec<Receipt>,
    /// Rejected transactions.
    pub rejected: Vec<RejectedTx>,
}

impl TransactionApplier {
    /// Creates an applier with nothing applied yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the transaction at position `index` of the block.
    ///
    /// A rejected transaction is recorded and is not an error. The only error is a lookup of a
    /// block hash the environment does not know, which invalidates the whole block.
    pub fn apply<S, E>(
        &mut self,
        state: &mut S,
        executor: &mut E,
        ctx: &BlockContext,
        pool: &mut GasPool,
        index: usize,
        tx: &BlockTransaction,
    ) -> Result<(), BlockExecutionError>
    where
        S: StateDb,
        E: MessageExecutor<S>,
    {
        let tx = match tx {
            BlockTransaction::Signed(tx) => tx,
            BlockTransaction::Malformed { reason } => {
                self.reject(index, None, InvalidTransaction::Malformed(reason.clone()));
                return Ok(());
            }
        };
        let hash = *tx.tx_hash();

        if tx.is_eip4844() && ctx.excess_blob_gas.is_none() {
            self.reject(index, Some(hash), InvalidTransaction::MissingBlobGasContext);
            return Ok(());
        }
        let msg = match Message::from_transaction(tx, &ctx.rules, ctx.chain_id, ctx.base_fee) {
            Ok(msg) => msg,
            Err(err) => {
                self.reject(index, Some(hash), err);
                return Ok(());
            }
        };

        state.set_tx_context(hash, self.included.len());
        let snapshot = state.snapshot();
        let (prev_gas, prev_blob_gas) = (pool.gas(), pool.blob_gas());

        let result = match executor.apply_message(state, ctx, &msg, pool) {
            Ok(result) => result,
            Err(err) => {
                state.revert_to_snapshot(snapshot);
                pool.set_gas(prev_gas);
                pool.set_blob_gas(prev_blob_gas);
                self.reject(index, Some(hash), err);
                return Ok(());
            }
        };
        if let Some(number) = ctx.block_hashes.missing() {
            return Err(BlockExecutionError::MissingBlockhash { index, hash, number });
        }

        self.gas_used += result.used_gas;
        let tx_blob_gas = if tx.is_eip4844() {
            let blob_gas = blob_gas_used(msg.blob_hashes.len() as u64);
            self.blob_gas_used += blob_gas;
            Some(blob_gas)
        } else {
            None
        };

        let root = if ctx.rules.is_byzantium {
            state.finalize(ctx.rules.is_eip158);
            None
        } else {
            Some(state.intermediate_root(ctx.rules.is_eip158))
        };

        let logs = state.logs(hash);
        let mut logs_bloom = Bloom::default();
        for log in &logs {
            logs_bloom.accrue_log(log);
        }

        debug!(
            index,
            hash = %hash,
            gas_used = result.used_gas,
            failed = result.failed,
            "Applied transaction"
        );
        self.receipts.push(Receipt {
            tx_type: tx.ty(),
            root,
            status: !result.failed,
            cumulative_gas_used: self.gas_used,
            logs_bloom,
            logs,
            transaction_hash: hash,
            contract_address: msg.is_create().then(|| msg.from.create(msg.nonce)),
            gas_used: result.used_gas,
            effective_gas_price: msg.gas_price,
            blob_gas_used: tx_blob_gas,
            blob_gas_price: tx_blob_gas.and_then(|_| ctx.blob_gas_price()),
            block_hash: B256::ZERO,
            transaction_index: self.included.len() as u64,
        });
        self.included.push(tx.clone());
        Ok(())
    }

    fn reject(&mut self, index: usize, hash: Option<B256>, err: InvalidTransaction) {
        warn!(index, hash = ?hash, error = %err, "Rejected transaction");
        self.rejected.push(RejectedTx { index: index as u64, error: err.to_string() });
    }
}

#[cfg(test)]
mod tests {
    use alloy_consensus::{TxEip4844, TxLegacy};
    use alloy_hardforks::EthereumHardfork;
    use alloy_primitives::{address, Address, Bytes, TxKind, U256};

    use super::*;
    use crate::{
        chain::ChainConfig,
        env::BlockEnv,
        executor::EthMessageExecutor,
        interfaces::{Frame, FrameResult, MessageResult},
        state::{Alloc, AllocAccount, MemoryState},
        test_utils::{sign_eip4844, sign_legacy, TestSigner},
    };

    const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

    fn transfer(signer: &TestSigner, nonce: u64, gas_limit: u64) -> BlockTransaction {
        sign_legacy(
            TxLegacy {
                chain_id: Some(1),
                nonce,
                gas_price: 1,
                gas_limit,
                to: TxKind::Call(BOB),
                value: U256::from(1),
                input: Bytes::new(),
            },
            signer,
        )
        .into()
    }

    fn setup(fork: EthereumHardfork, env: BlockEnv) -> (MemoryState, BlockContext, TestSigner) {
        let signer = TestSigner::from_seed(1);
        let state = MemoryState::new(&Alloc::from([(
            signer.address(),
            AllocAccount::with_balance(U256::from(1_000_000_000u64)),
        )]));
        let ctx = BlockContext::new(&ChainConfig::for_fork(fork), &env);
        (state, ctx, signer)
    }

    #[test]
    fn test_included_and_rejected() {
        let (mut state, ctx, signer) =
            setup(EthereumHardfork::Berlin, BlockEnv { gas_limit: 50_000, ..Default::default() });
        let mut pool = GasPool::new(ctx.gas_limit);
        let mut applier = TransactionApplier::new();
        let mut executor = EthMessageExecutor::new();

        let txs = [
            transfer(&signer, 0, 21_000),
            transfer(&signer, 0, 21_000),
            BlockTransaction::Malformed { reason: "bad rlp".to_string() },
            transfer(&signer, 1, 40_000),
            transfer(&signer, 1, 21_000),
        ];
        for (index, tx) in txs.iter().enumerate() {
            applier.apply(&mut state, &mut executor, &ctx, &mut pool, index, tx).unwrap();
        }

        assert_eq!(applier.included.len(), 2);
        assert_eq!(applier.gas_used, 42_000);
        assert_eq!(pool.gas(), 8_000);
        assert_eq!(
            applier.rejected.iter().map(|rejected| rejected.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(applier.rejected[0].error.starts_with("nonce too low"));
        assert_eq!(applier.rejected[1].error, "malformed transaction: bad rlp");
        assert_eq!(applier.rejected[2].error, "gas limit reached");

        let receipt = &applier.receipts[1];
        assert_eq!(receipt.cumulative_gas_used, 42_000);
        assert_eq!(receipt.transaction_index, 1);
        assert!(receipt.status);
        assert_eq!(receipt.root, None);
        assert_eq!(state.nonce(signer.address()), 2);
    }

    #[test]
    fn test_rejection_restores_state_and_pool() {
        let (mut state, ctx, signer) =
            setup(EthereumHardfork::Berlin, BlockEnv { gas_limit: 100_000, ..Default::default() });
        let mut pool = GasPool::new(ctx.gas_limit).with_blob_gas(7);
        // Consumes from the pool and the state before failing.
        let mut executor = FnExecutor(
            |state: &mut MemoryState,
             _: &BlockContext,
             msg: &Message,
             pool: &mut GasPool|
             -> Result<MessageResult, InvalidTransaction> {
                pool.sub_gas(30_000)?;
                pool.sub_blob_gas(7)?;
                state.set_balance(msg.from, U256::ZERO);
                Err(InvalidTransaction::IntrinsicGas { have: 0, want: 1 })
            },
        );
        let mut applier = TransactionApplier::new();
        let tx = transfer(&signer, 0, 21_000);
        applier.apply(&mut state, &mut executor, &ctx, &mut pool, 0, &tx).unwrap();

        assert_eq!((pool.gas(), pool.blob_gas()), (100_000, 7));
        assert_eq!(state.balance(signer.address()), U256::from(1_000_000_000u64));
        assert!(applier.receipts.is_empty());
        assert_eq!(applier.rejected[0].error, "intrinsic gas too low: have 0, want 1");
    }

    struct FnExecutor<F>(F);

    impl<F> MessageExecutor<MemoryState> for FnExecutor<F>
    where
        F: FnMut(
            &mut MemoryState,
            &BlockContext,
            &Message,
            &mut GasPool,
        ) -> Result<MessageResult, InvalidTransaction>,
    {
        fn apply_message(
            &mut self,
            state: &mut MemoryState,
            ctx: &BlockContext,
            msg: &Message,
            pool: &mut GasPool,
        ) -> Result<MessageResult, InvalidTransaction> {
            (self.0)(state, ctx, msg, pool)
        }
    }

    #[test]
    fn test_pre_byzantium_receipt_root() {
        let env = BlockEnv { gas_limit: 100_000, ..Default::default() };
        let (mut state, ctx, signer) = setup(EthereumHardfork::SpuriousDragon, env);
        let mut pool = GasPool::new(ctx.gas_limit);
        let mut applier = TransactionApplier::new();
        let tx = transfer(&signer, 0, 21_000);
        applier.apply(&mut state, &mut EthMessageExecutor::new(), &ctx, &mut pool, 0, &tx).unwrap();
        let root = applier.receipts[0].root.unwrap();
        assert_eq!(root, state.intermediate_root(true));
    }

    #[test]
    fn test_blob_transaction_without_context() {
        let env = BlockEnv { gas_limit: 100_000, base_fee: Some(1), ..Default::default() };
        let (mut state, ctx, signer) = setup(EthereumHardfork::Cancun, env);
        let tx = sign_eip4844(
            TxEip4844 {
                chain_id: 1,
                gas_limit: 21_000,
                max_fee_per_gas: 1,
                to: BOB,
                blob_versioned_hashes: vec![B256::with_last_byte(1)],
                max_fee_per_blob_gas: 1,
                ..Default::default()
            },
            &signer,
        );
        let mut pool = GasPool::new(ctx.gas_limit);
        let mut applier = TransactionApplier::new();
        applier
            .apply(&mut state, &mut EthMessageExecutor::new(), &ctx, &mut pool, 0, &tx.into())
            .unwrap();
        assert_eq!(applier.rejected[0].error, "blob tx used but field env.ExcessBlobGas missing");
        assert_eq!(state.nonce(signer.address()), 0);
    }

    #[test]
    fn test_missing_block_hash_aborts() {
        let env = BlockEnv { number: 10, gas_limit: 100_000, ..Default::default() };
        let (mut state, ctx, signer) = setup(EthereumHardfork::Berlin, env);
        let interpreter = |_: &mut MemoryState, ctx: &BlockContext, _: &Frame| {
            let _ = ctx.block_hash(5);
            FrameResult::success(0, Bytes::new())
        };
        let contract = address!("0x00000000000000000000000000000000000000cc");
        state.set_code(contract, Bytes::from_static(&[0x40]));
        let tx = sign_legacy(
            TxLegacy {
                chain_id: Some(1),
                gas_price: 1,
                gas_limit: 50_000,
                to: TxKind::Call(contract),
                ..Default::default()
            },
            &signer,
        );

        let mut applier = TransactionApplier::new();
        let err = applier
            .apply(
                &mut state,
                &mut EthMessageExecutor::with_interpreter(interpreter),
                &ctx,
                &mut GasPool::new(ctx.gas_limit),
                3,
                &tx.into(),
            )
            .unwrap_err();
        assert!(matches!(err, BlockExecutionError::MissingBlockhash { index: 3, number: 5, .. }));
    }
}
