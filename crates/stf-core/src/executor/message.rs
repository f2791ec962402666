use alloy_consensus::TxType;
use alloy_primitives::{Address, Bytes, U256};
use alloy_trie::KECCAK_EMPTY;

use crate::{
    chain::Rules,
    constants::{
        berlin, eip4844::VERSIONED_HASH_VERSION_KZG, frontier, homestead, istanbul, london,
        shanghai, spurious_dragon,
    },
    eip4844::blob_gas_used,
    env::BlockContext,
    error::InvalidTransaction,
    gas_pool::GasPool,
    interfaces::{
        Frame, FrameKind, FrameResult, FrameStatus, Interpreter, MessageExecutor, MessageResult,
        NoopInterpreter, SnapshotId, StateDb,
    },
    message::Message,
};

const BLOB_TX_TYPE: u8 = TxType::Eip4844 as u8;

/// The message-level state transition of Ethereum.
///
/// Validates the message against the sender account and the block, buys its gas, transfers the
/// value and hands the code to the [`Interpreter`]. Whatever the interpreter reports, the sender
/// pays for the gas used and unused gas goes back to the sender and the pool.
#[derive(Debug, Clone, Default)]
pub struct EthMessageExecutor<I = NoopInterpreter> {
    interpreter: I,
}

impl EthMessageExecutor {
    /// Creates an executor for which all code succeeds without effect.
    pub const fn new() -> Self {
        Self { interpreter: NoopInterpreter }
    }
}

impl<I> EthMessageExecutor<I> {
    /// Creates an executor running code with `interpreter`.
    pub const fn with_interpreter(interpreter: I) -> Self {
        Self { interpreter }
    }

    /// Returns the interpreter.
    pub const fn interpreter(&self) -> &I {
        &self.interpreter
    }
}

impl<S, I> MessageExecutor<S> for EthMessageExecutor<I>
where
    S: StateDb,
    I: Interpreter<S>,
{
    fn apply_message(
        &mut self,
        state: &mut S,
        ctx: &BlockContext,
        msg: &Message,
        pool: &mut GasPool,
    ) -> Result<MessageResult, InvalidTransaction> {
        let rules = ctx.rules;
        pre_check(state, ctx, msg)?;
        buy_gas(state, ctx, msg, pool)?;

        let intrinsic = intrinsic_gas(msg, &rules)?;
        if msg.gas_limit < intrinsic {
            return Err(InvalidTransaction::IntrinsicGas { have: msg.gas_limit, want: intrinsic });
        }
        if state.balance(msg.from) < msg.value {
            return Err(InvalidTransaction::InsufficientFundsForTransfer(msg.from));
        }
        if rules.is_shanghai && msg.is_create() && msg.input.len() > shanghai::MAX_INITCODE_SIZE {
            return Err(InvalidTransaction::MaxInitCodeSizeExceeded {
                size: msg.input.len(),
                limit: shanghai::MAX_INITCODE_SIZE,
            });
        }

        let gas = msg.gas_limit - intrinsic;
        state.set_nonce(msg.from, msg.nonce + 1);
        let result = match msg.to {
            Some(to) => self.call(state, ctx, msg, to, gas),
            None => self.create(state, ctx, msg, gas),
        };

        let success = result.status == FrameStatus::Success;
        let mut used_gas = intrinsic + result.gas_used;
        if success {
            let quotient =
                if rules.is_london { london::REFUND_QUOTIENT } else { frontier::REFUND_QUOTIENT };
            used_gas -= result.gas_refund.min(used_gas / quotient);
        }

        let remaining = msg.gas_limit - used_gas;
        state.add_balance(msg.from, U256::from(remaining) * U256::from(msg.gas_price));
        pool.add_gas(remaining);

        let tip = match ctx.base_fee.filter(|_| rules.is_london) {
            Some(base_fee) => msg.gas_price.saturating_sub(u128::from(base_fee)),
            None => msg.gas_price,
        };
        state.add_balance(ctx.coinbase, U256::from(used_gas) * U256::from(tip));

        Ok(MessageResult { used_gas, failed: !success, return_data: result.output })
    }
}

impl<I> EthMessageExecutor<I> {
    fn call<S>(
        &mut self,
        state: &mut S,
        ctx: &BlockContext,
        msg: &Message,
        to: Address,
        gas: u64,
    ) -> FrameResult
    where
        S: StateDb,
        I: Interpreter<S>,
    {
        let snapshot = state.snapshot();
        if ctx.rules.is_eip158 && msg.value.is_zero() && !state.exists(to) {
            return FrameResult::success(0, Bytes::new());
        }
        transfer(state, msg.from, to, msg.value);

        let code = state.code(to);
        if code.is_empty() {
            return FrameResult::success(0, Bytes::new());
        }
        let frame = Frame {
            kind: FrameKind::Call,
            caller: msg.from,
            address: to,
            value: msg.value,
            input: msg.input.clone(),
            code,
            gas,
        };
        let result = self.interpreter.execute(state, ctx, &frame);
        settle(state, snapshot, result, gas)
    }

    fn create<S>(&mut self, state: &mut S, ctx: &BlockContext, msg: &Message, gas: u64) -> FrameResult
    where
        S: StateDb,
        I: Interpreter<S>,
    {
        let rules = ctx.rules;
        let address = msg.from.create(msg.nonce);
        let snapshot = state.snapshot();

        let code_hash = state.code_hash(address);
        if state.nonce(address) != 0 || (!code_hash.is_zero() && code_hash != KECCAK_EMPTY) {
            return settle(state, snapshot, FrameResult::halt(), gas);
        }

        if rules.is_eip158 {
            state.set_nonce(address, 1);
        }
        transfer(state, msg.from, address, msg.value);

        let frame = Frame {
            kind: FrameKind::Create,
            caller: msg.from,
            address,
            value: msg.value,
            input: Bytes::new(),
            code: msg.input.clone(),
            gas,
        };
        let mut result = self.interpreter.execute(state, ctx, &frame);
        if result.status == FrameStatus::Success {
            result.gas_used = result.gas_used.min(gas);
            let code = &result.output;
            let deposit = code.len() as u64 * frontier::CREATE_DATA_GAS;
            if rules.is_eip158 && code.len() > spurious_dragon::MAX_CODE_SIZE {
                result = FrameResult::halt();
            } else if rules.is_london && code.first() == Some(&london::RESERVED_CODE_PREFIX) {
                result = FrameResult::halt();
            } else if gas - result.gas_used >= deposit {
                state.set_code(address, code.clone());
                result.gas_used += deposit;
            } else if rules.is_homestead {
                result = FrameResult::halt();
            }
            // Frontier keeps the account without code when the deposit cannot be paid.
        }
        settle(state, snapshot, result, gas)
    }
}

/// Checks the message against the sender account and the fee parameters of the block.
fn pre_check<S: StateDb>(
    state: &mut S,
    ctx: &BlockContext,
    msg: &Message,
) -> Result<(), InvalidTransaction> {
    let address = msg.from;
    let nonce = state.nonce(address);
    if nonce < msg.nonce {
        return Err(InvalidTransaction::NonceTooHigh { address, tx: msg.nonce, state: nonce });
    }
    if nonce > msg.nonce {
        return Err(InvalidTransaction::NonceTooLow { address, tx: msg.nonce, state: nonce });
    }
    if nonce == u64::MAX {
        return Err(InvalidTransaction::NonceMax { address, nonce });
    }

    let code_hash = state.code_hash(address);
    if !code_hash.is_zero() && code_hash != KECCAK_EMPTY {
        return Err(InvalidTransaction::SenderNoEoa { address, code_hash });
    }

    if ctx.rules.is_london {
        if msg.gas_tip_cap > msg.gas_fee_cap {
            return Err(InvalidTransaction::TipAboveFeeCap {
                address,
                tip: msg.gas_tip_cap,
                fee_cap: msg.gas_fee_cap,
            });
        }
        let base_fee = ctx.base_fee.unwrap_or_default();
        if msg.gas_fee_cap < u128::from(base_fee) {
            return Err(InvalidTransaction::FeeCapTooLow { address, fee_cap: msg.gas_fee_cap, base_fee });
        }
    }

    if msg.tx_type == BLOB_TX_TYPE {
        if msg.blob_hashes.is_empty() {
            return Err(InvalidTransaction::MissingBlobHashes);
        }
        for (index, hash) in msg.blob_hashes.iter().enumerate() {
            if hash[0] != VERSIONED_HASH_VERSION_KZG {
                return Err(InvalidTransaction::InvalidBlobHashVersion { index, version: hash[0] });
            }
        }
    }

    if ctx.rules.is_cancun && !msg.blob_hashes.is_empty() {
        let price = ctx.blob_gas_price().ok_or(InvalidTransaction::MissingBlobGasContext)?;
        let fee_cap = msg.blob_gas_fee_cap.unwrap_or_default();
        if U256::from(fee_cap) < price {
            return Err(InvalidTransaction::BlobFeeCapTooLow { address, fee_cap, price });
        }
    }
    Ok(())
}

/// Takes the gas of the message from the pool and charges the sender for it.
fn buy_gas<S: StateDb>(
    state: &mut S,
    ctx: &BlockContext,
    msg: &Message,
    pool: &mut GasPool,
) -> Result<(), InvalidTransaction> {
    let gas_limit = U256::from(msg.gas_limit);
    let mut cost = gas_limit * U256::from(msg.gas_price);
    let mut required = (gas_limit * U256::from(msg.gas_fee_cap)).saturating_add(msg.value);

    let blob_gas = blob_gas_used(msg.blob_hashes.len() as u64);
    if blob_gas > 0 {
        let price = ctx.blob_gas_price().ok_or(InvalidTransaction::MissingBlobGasContext)?;
        let fee_cap = U256::from(msg.blob_gas_fee_cap.unwrap_or_default());
        required = required.saturating_add(U256::from(blob_gas) * fee_cap);
        cost = cost.saturating_add(U256::from(blob_gas).saturating_mul(price));
    }

    let have = state.balance(msg.from);
    if have < required {
        return Err(InvalidTransaction::InsufficientFunds { address: msg.from, have, want: required });
    }

    pool.sub_gas(msg.gas_limit)?;
    if blob_gas > 0 {
        pool.sub_blob_gas(blob_gas)?;
    }
    state.sub_balance(msg.from, cost);
    Ok(())
}

/// Returns the gas charged before any code runs.
pub fn intrinsic_gas(msg: &Message, rules: &Rules) -> Result<u64, InvalidTransaction> {
    let mut gas = if msg.is_create() && rules.is_homestead {
        homestead::TX_GAS_CONTRACT_CREATION
    } else {
        frontier::TX_GAS
    };

    let data = &msg.input;
    if !data.is_empty() {
        let non_zero = data.iter().filter(|byte| **byte != 0).count() as u64;
        let zero = data.len() as u64 - non_zero;
        let non_zero_gas = if rules.is_istanbul {
            istanbul::TX_DATA_NON_ZERO_GAS
        } else {
            frontier::TX_DATA_NON_ZERO_GAS
        };
        gas = non_zero
            .checked_mul(non_zero_gas)
            .and_then(|cost| gas.checked_add(cost))
            .and_then(|gas| gas.checked_add(zero.checked_mul(frontier::TX_DATA_ZERO_GAS)?))
            .ok_or(InvalidTransaction::GasUintOverflow)?;

        if msg.is_create() && rules.is_shanghai {
            let words = (data.len() as u64).div_ceil(32);
            gas = words
                .checked_mul(shanghai::INITCODE_WORD_GAS)
                .and_then(|cost| gas.checked_add(cost))
                .ok_or(InvalidTransaction::GasUintOverflow)?;
        }
    }

    let addresses = msg.access_list.len() as u64;
    let keys = msg.access_list.iter().map(|item| item.storage_keys.len() as u64).sum::<u64>();
    gas = addresses
        .checked_mul(berlin::TX_ACCESS_LIST_ADDRESS_GAS)
        .and_then(|cost| gas.checked_add(cost))
        .and_then(|gas| gas.checked_add(keys.checked_mul(berlin::TX_ACCESS_LIST_STORAGE_KEY_GAS)?))
        .ok_or(InvalidTransaction::GasUintOverflow)?;
    Ok(gas)
}

fn transfer<S: StateDb>(state: &mut S, from: Address, to: Address, value: U256) {
    state.sub_balance(from, value);
    state.add_balance(to, value);
}

/// Applies the outcome of a frame: failed frames are reverted, halted frames consume all gas.
fn settle<S: StateDb>(state: &mut S, snapshot: SnapshotId, mut result: FrameResult, gas: u64) -> FrameResult {
    result.gas_used = result.gas_used.min(gas);
    match result.status {
        FrameStatus::Success => {}
        FrameStatus::Revert => {
            state.revert_to_snapshot(snapshot);
            result.gas_refund = 0;
        }
        FrameStatus::Halt => {
            state.revert_to_snapshot(snapshot);
            result.gas_used = gas;
            result.gas_refund = 0;
            result.output = Bytes::new();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use alloy_consensus::{TxEip1559, TxEnvelope, TxLegacy};
    use alloy_eips::eip2930::{AccessList, AccessListItem};
    use alloy_hardforks::EthereumHardfork;
    use alloy_primitives::{address, b256, Log, LogData, TxKind, B256};
    use rstest::rstest;

    use super::*;
    use crate::{
        chain::ChainConfig,
        env::BlockEnv,
        state::{Alloc, AllocAccount, MemoryState},
        test_utils::{sign_eip1559, sign_legacy, TestSigner},
    };

    const COINBASE: Address = address!("0x00000000000000000000000000000000000c0ffe");
    const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

    fn context(fork: EthereumHardfork, base_fee: Option<u64>) -> BlockContext {
        let env = BlockEnv {
            coinbase: COINBASE,
            gas_limit: 1_000_000,
            base_fee,
            excess_blob_gas: Some(0),
            ..Default::default()
        };
        BlockContext::new(&ChainConfig::for_fork(fork), &env)
    }

    fn message(tx: &TxEnvelope, ctx: &BlockContext) -> Message {
        Message::from_transaction(tx, &ctx.rules, ctx.chain_id, ctx.base_fee).unwrap()
    }

    fn legacy(signer: &TestSigner, nonce: u64, to: TxKind, value: u64, input: Bytes) -> TxEnvelope {
        sign_legacy(
            TxLegacy {
                chain_id: Some(1),
                nonce,
                gas_price: 10,
                gas_limit: 100_000,
                to,
                value: U256::from(value),
                input,
            },
            signer,
        )
    }

    fn funded(signer: &TestSigner) -> MemoryState {
        MemoryState::new(&Alloc::from([(
            signer.address(),
            AllocAccount::with_balance(U256::from(10_000_000)),
        )]))
    }

    #[test]
    fn test_plain_transfer() {
        let signer = TestSigner::from_seed(1);
        let ctx = context(EthereumHardfork::Berlin, None);
        let mut state = funded(&signer);
        let mut pool = GasPool::new(1_000_000);
        let msg = message(&legacy(&signer, 0, TxKind::Call(BOB), 5, Bytes::new()), &ctx);

        let result =
            EthMessageExecutor::new().apply_message(&mut state, &ctx, &msg, &mut pool).unwrap();
        assert_eq!(result, MessageResult { used_gas: 21_000, failed: false, return_data: Bytes::new() });
        assert_eq!(pool.gas(), 1_000_000 - 21_000);
        assert_eq!(state.balance(signer.address()), U256::from(10_000_000 - 5 - 210_000));
        assert_eq!(state.nonce(signer.address()), 1);
        assert_eq!(state.balance(BOB), U256::from(5));
        assert_eq!(state.balance(COINBASE), U256::from(210_000));
    }

    #[test]
    fn test_london_burns_base_fee() {
        let signer = TestSigner::from_seed(1);
        let ctx = context(EthereumHardfork::London, Some(7));
        let mut state = funded(&signer);
        let mut pool = GasPool::new(1_000_000);
        let tx = sign_eip1559(
            TxEip1559 {
                chain_id: 1,
                gas_limit: 30_000,
                max_fee_per_gas: 20,
                max_priority_fee_per_gas: 2,
                to: TxKind::Call(BOB),
                ..Default::default()
            },
            &signer,
        );
        let msg = message(&tx, &ctx);
        assert_eq!(msg.gas_price, 9);

        EthMessageExecutor::new().apply_message(&mut state, &ctx, &msg, &mut pool).unwrap();
        assert_eq!(state.balance(signer.address()), U256::from(10_000_000 - 21_000 * 9));
        assert_eq!(state.balance(COINBASE), U256::from(21_000 * 2));
    }

    #[rstest]
    #[case::nonce_too_high(1, 0, InvalidTransaction::NonceTooHigh { address: TestSigner::from_seed(1).address(), tx: 1, state: 0 })]
    #[case::nonce_too_low(0, 1, InvalidTransaction::NonceTooLow { address: TestSigner::from_seed(1).address(), tx: 0, state: 1 })]
    fn test_nonce_checks(#[case] tx_nonce: u64, #[case] state_nonce: u64, #[case] want: InvalidTransaction) {
        let signer = TestSigner::from_seed(1);
        let ctx = context(EthereumHardfork::Berlin, None);
        let mut state = MemoryState::new(&Alloc::from([(
            signer.address(),
            AllocAccount::with_balance(U256::from(10_000_000)).nonce(state_nonce),
        )]));
        let mut pool = GasPool::new(1_000_000);
        let msg = message(&legacy(&signer, tx_nonce, TxKind::Call(BOB), 0, Bytes::new()), &ctx);
        let err = EthMessageExecutor::new()
            .apply_message(&mut state, &ctx, &msg, &mut pool)
            .unwrap_err();
        assert_eq!(err, want);
    }

    #[test]
    fn test_sender_with_code_is_rejected() {
        let signer = TestSigner::from_seed(1);
        let ctx = context(EthereumHardfork::Berlin, None);
        let mut state = MemoryState::new(&Alloc::from([(
            signer.address(),
            AllocAccount::with_balance(U256::from(10_000_000)).code(vec![0x00]),
        )]));
        let msg = message(&legacy(&signer, 0, TxKind::Call(BOB), 0, Bytes::new()), &ctx);
        let err = EthMessageExecutor::new()
            .apply_message(&mut state, &ctx, &msg, &mut GasPool::new(1_000_000))
            .unwrap_err();
        assert!(matches!(err, InvalidTransaction::SenderNoEoa { .. }));
    }

    #[test]
    fn test_insufficient_funds_and_pool() {
        let signer = TestSigner::from_seed(1);
        let ctx = context(EthereumHardfork::Berlin, None);
        let msg = message(&legacy(&signer, 0, TxKind::Call(BOB), 0, Bytes::new()), &ctx);

        let mut poor = MemoryState::new(&Alloc::from([(
            signer.address(),
            AllocAccount::with_balance(U256::from(999_999)),
        )]));
        let err = EthMessageExecutor::new()
            .apply_message(&mut poor, &ctx, &msg, &mut GasPool::new(1_000_000))
            .unwrap_err();
        assert_eq!(
            err,
            InvalidTransaction::InsufficientFunds {
                address: signer.address(),
                have: U256::from(999_999),
                want: U256::from(1_000_000),
            }
        );

        let mut pool = GasPool::new(99_999);
        let err = EthMessageExecutor::new()
            .apply_message(&mut funded(&signer), &ctx, &msg, &mut pool)
            .unwrap_err();
        assert_eq!(err.to_string(), "gas limit reached");
        assert_eq!(pool.gas(), 99_999);
    }

    #[test]
    fn test_intrinsic_gas() {
        let signer = TestSigner::from_seed(1);
        let ctx = context(EthereumHardfork::Shanghai, Some(0));
        let mut msg =
            message(&legacy(&signer, 0, TxKind::Create, 0, Bytes::from(vec![0, 1, 0, 2])), &ctx);
        // 53000 + 2 * 4 + 2 * 16 + 1 word * 2
        assert_eq!(intrinsic_gas(&msg, &ctx.rules), Ok(53_042));

        msg.to = Some(BOB);
        msg.access_list = AccessList(vec![AccessListItem {
            address: BOB,
            storage_keys: vec![B256::ZERO, B256::with_last_byte(1)],
        }]);
        assert_eq!(intrinsic_gas(&msg, &ctx.rules), Ok(21_040 + 2_400 + 2 * 1_900));

        let frontier = ChainConfig::for_fork(EthereumHardfork::Frontier).rules(0, 0);
        msg.to = None;
        msg.access_list = AccessList::default();
        assert_eq!(intrinsic_gas(&msg, &frontier), Ok(21_000 + 8 + 2 * 68));

        msg.gas_limit = 53_041;
        let err = EthMessageExecutor::new()
            .apply_message(&mut funded(&signer), &ctx, &msg, &mut GasPool::new(1_000_000))
            .unwrap_err();
        assert_eq!(err, InvalidTransaction::IntrinsicGas { have: 53_041, want: 53_042 });
    }

    #[test]
    fn test_reverted_call_keeps_nonce_and_fee() {
        let signer = TestSigner::from_seed(1);
        let ctx = context(EthereumHardfork::Berlin, None);
        let contract = address!("0x00000000000000000000000000000000000000cc");
        let mut state = MemoryState::new(&Alloc::from([
            (signer.address(), AllocAccount::with_balance(U256::from(10_000_000))),
            (contract, AllocAccount::default().code(vec![0xfd])),
        ]));
        let interpreter = |state: &mut MemoryState, _: &BlockContext, frame: &Frame| {
            state.set_storage(frame.address, U256::from(1), U256::from(1));
            FrameResult::revert(5_000, Bytes::from_static(b"no"))
        };
        let msg = message(&legacy(&signer, 0, TxKind::Call(contract), 7, Bytes::new()), &ctx);

        let result = EthMessageExecutor::with_interpreter(interpreter)
            .apply_message(&mut state, &ctx, &msg, &mut GasPool::new(1_000_000))
            .unwrap();
        assert!(result.failed);
        assert_eq!(result.used_gas, 26_000);
        assert_eq!(result.return_data, Bytes::from_static(b"no"));
        assert_eq!(state.nonce(signer.address()), 1);
        assert_eq!(state.balance(signer.address()), U256::from(10_000_000 - 260_000));
        assert_eq!(state.balance(contract), U256::ZERO);
        assert_eq!(state.storage(contract, U256::from(1)), U256::ZERO);
    }

    #[test]
    fn test_halt_consumes_all_gas() {
        let signer = TestSigner::from_seed(1);
        let ctx = context(EthereumHardfork::Berlin, None);
        let contract = address!("0x00000000000000000000000000000000000000cc");
        let mut state = MemoryState::new(&Alloc::from([
            (signer.address(), AllocAccount::with_balance(U256::from(10_000_000))),
            (contract, AllocAccount::default().code(vec![0xfe])),
        ]));
        let interpreter = |state: &mut MemoryState, _: &BlockContext, frame: &Frame| {
            state.add_log(Log { address: frame.address, data: LogData::empty() });
            FrameResult::halt()
        };
        let msg = message(&legacy(&signer, 0, TxKind::Call(contract), 0, Bytes::new()), &ctx);
        let mut pool = GasPool::new(1_000_000);

        let result = EthMessageExecutor::with_interpreter(interpreter)
            .apply_message(&mut state, &ctx, &msg, &mut pool)
            .unwrap();
        assert!(result.failed);
        assert_eq!(result.used_gas, 100_000);
        assert_eq!(pool.gas(), 900_000);
        assert!(state.all_logs().is_empty());
    }

    #[test]
    fn test_refund_is_capped() {
        let signer = TestSigner::from_seed(1);
        let ctx = context(EthereumHardfork::Berlin, None);
        let contract = address!("0x00000000000000000000000000000000000000cc");
        let mut state = MemoryState::new(&Alloc::from([
            (signer.address(), AllocAccount::with_balance(U256::from(10_000_000))),
            (contract, AllocAccount::default().code(vec![0x00])),
        ]));
        let interpreter = |_: &mut MemoryState, _: &BlockContext, _: &Frame| {
            FrameResult::success(9_000, Bytes::new()).with_refund(100_000)
        };
        let msg = message(&legacy(&signer, 0, TxKind::Call(contract), 0, Bytes::new()), &ctx);
        let result = EthMessageExecutor::with_interpreter(interpreter)
            .apply_message(&mut state, &ctx, &msg, &mut GasPool::new(1_000_000))
            .unwrap();
        assert_eq!(result.used_gas, 15_000);
    }

    #[test]
    fn test_create_deploys_returned_code() {
        let signer = TestSigner::from_seed(1);
        let ctx = context(EthereumHardfork::Berlin, None);
        let mut state = funded(&signer);
        let interpreter = |_: &mut MemoryState, _: &BlockContext, frame: &Frame| {
            assert_eq!(frame.kind, FrameKind::Create);
            FrameResult::success(1_000, Bytes::from_static(&[0x60, 0x00]))
        };
        let msg = message(&legacy(&signer, 0, TxKind::Create, 3, Bytes::from_static(&[0x01])), &ctx);
        let result = EthMessageExecutor::with_interpreter(interpreter)
            .apply_message(&mut state, &ctx, &msg, &mut GasPool::new(1_000_000))
            .unwrap();

        let created = signer.address().create(0);
        assert!(!result.failed);
        assert_eq!(result.used_gas, 53_016 + 1_000 + 400);
        assert_eq!(state.code(created), Bytes::from_static(&[0x60, 0x00]));
        assert_eq!(state.nonce(created), 1);
        assert_eq!(state.balance(created), U256::from(3));
    }

    #[test]
    fn test_create_rejects_reserved_prefix() {
        let signer = TestSigner::from_seed(1);
        let ctx = context(EthereumHardfork::London, Some(0));
        let mut state = funded(&signer);
        let interpreter = |_: &mut MemoryState, _: &BlockContext, _: &Frame| {
            FrameResult::success(0, Bytes::from_static(&[0xef]))
        };
        let msg = message(&legacy(&signer, 0, TxKind::Create, 0, Bytes::new()), &ctx);
        let result = EthMessageExecutor::with_interpreter(interpreter)
            .apply_message(&mut state, &ctx, &msg, &mut GasPool::new(1_000_000))
            .unwrap();
        assert!(result.failed);
        assert_eq!(result.used_gas, 100_000);
        assert!(!state.exists(signer.address().create(0)));
    }

    #[test]
    fn test_blob_checks() {
        let signer = TestSigner::from_seed(1);
        let ctx = context(EthereumHardfork::Cancun, Some(0));
        let mut msg = message(&legacy(&signer, 0, TxKind::Call(BOB), 0, Bytes::new()), &ctx);
        msg.tx_type = BLOB_TX_TYPE;
        msg.blob_gas_fee_cap = Some(1);

        let mut state = funded(&signer);
        let mut run = |msg: &Message| {
            EthMessageExecutor::new().apply_message(&mut state, &ctx, msg, &mut GasPool::new(1_000_000))
        };
        assert_eq!(run(&msg).unwrap_err(), InvalidTransaction::MissingBlobHashes);

        msg.blob_hashes = vec![b256!("0x0200000000000000000000000000000000000000000000000000000000000000")];
        assert_eq!(
            run(&msg).unwrap_err(),
            InvalidTransaction::InvalidBlobHashVersion { index: 0, version: 2 }
        );

        msg.blob_hashes[0][0] = VERSIONED_HASH_VERSION_KZG;
        msg.blob_gas_fee_cap = Some(0);
        assert!(matches!(run(&msg).unwrap_err(), InvalidTransaction::BlobFeeCapTooLow { .. }));
    }
}
