//! Capabilities the block executor relies on: state access, message execution, code
//! interpretation and witness generation.

use alloy_primitives::{Address, BlockNumber, Bytes, Log, TxHash, B256, U256};
use auto_impl::auto_impl;

use crate::{
    env::BlockContext,
    error::{InvalidTransaction, StateError, TransitionError, WitnessError},
    gas_pool::GasPool,
    message::Message,
    state::StemTree,
    transition::{MigrationProgress, TransitionTracker},
    witness::Witness,
};

/// Identifies a point of the state journal that can be reverted to.
pub type SnapshotId = usize;

/// Mutable account and storage state of the block being executed.
///
/// Reads never create accounts. Every write makes the account exist and marks it as touched, so
/// that [`StateDb::finalize`] can remove it again if it is left empty.
#[auto_impl(&mut, Box)]
pub trait StateDb {
    /// Records a point to revert to.
    fn snapshot(&mut self) -> SnapshotId;

    /// Reverts every change made after `id` was taken.
    fn revert_to_snapshot(&mut self, id: SnapshotId);

    /// Returns `true` if the account exists.
    fn exists(&mut self, address: Address) -> bool;

    /// Returns `true` if the account is missing or empty in the sense of EIP-161.
    fn is_empty(&mut self, address: Address) -> bool;

    /// Returns the balance of the account.
    fn balance(&mut self, address: Address) -> U256;

    /// Sets the balance of the account.
    fn set_balance(&mut self, address: Address, balance: U256);

    /// Credits the account. Crediting zero still touches it.
    fn add_balance(&mut self, address: Address, amount: U256) {
        let balance = self.balance(address);
        self.set_balance(address, balance.saturating_add(amount));
    }

    /// Debits the account.
    fn sub_balance(&mut self, address: Address, amount: U256) {
        let balance = self.balance(address);
        self.set_balance(address, balance.saturating_sub(amount));
    }

    /// Returns the nonce of the account.
    fn nonce(&mut self, address: Address) -> u64;

    /// Sets the nonce of the account.
    fn set_nonce(&mut self, address: Address, nonce: u64);

    /// Returns the code of the account.
    fn code(&mut self, address: Address) -> Bytes;

    /// Returns the code hash of the account, zero if it does not exist.
    fn code_hash(&mut self, address: Address) -> B256;

    /// Deploys code to the account.
    fn set_code(&mut self, address: Address, code: Bytes);

    /// Returns the value of a storage slot.
    fn storage(&mut self, address: Address, slot: U256) -> U256;

    /// Sets the value of a storage slot.
    fn set_storage(&mut self, address: Address, slot: U256, value: U256);

    /// Sets the transaction that subsequent logs belong to.
    fn set_tx_context(&mut self, hash: TxHash, index: usize);

    /// Records a log of the current transaction.
    fn add_log(&mut self, log: Log);

    /// Returns the logs of a transaction.
    fn logs(&self, hash: TxHash) -> Vec<Log>;

    /// Returns every log of the block, in emission order.
    fn all_logs(&self) -> Vec<Log>;

    /// Closes the current transaction. With `clear_empty`, touched accounts that are empty are
    /// removed (EIP-161). Snapshots taken before are invalidated.
    fn finalize(&mut self, clear_empty: bool);

    /// Finalizes and returns the root the state would have if committed now.
    fn intermediate_root(&mut self, clear_empty: bool) -> B256;

    /// Finalizes, writes every change to the backing store and returns the new root.
    fn commit(&mut self, block_number: BlockNumber, clear_empty: bool) -> Result<B256, StateError>;

    /// Continues from the committed state with root `root`, discarding per-block data.
    fn reopen(&mut self, root: B256) -> Result<(), StateError>;

    /// Returns the progress of the storage format conversion.
    fn transition(&self) -> &TransitionTracker;

    /// Returns the progress of the storage format conversion for modification.
    fn transition_mut(&mut self) -> &mut TransitionTracker;

    /// Migrates up to `stride` legacy leaves to the new layout.
    fn advance_transition(&mut self, stride: u64) -> Result<MigrationProgress, TransitionError>;

    /// Returns the committed new-layout tree, if the new layout is active.
    fn stem_tree(&self) -> Option<&StemTree>;

    /// Returns the new-layout keys accessed since the state was opened.
    fn witness_keys(&self) -> Vec<B256>;
}

/// Outcome of a message that was valid. A failed execution is still a valid outcome: the
/// sender pays for the gas used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageResult {
    /// Gas charged to the sender, after refunds.
    pub used_gas: u64,
    /// Whether execution reverted or halted.
    pub failed: bool,
    /// Output of the execution.
    pub return_data: Bytes,
}

/// Applies a single message to the state.
#[auto_impl(&mut, Box)]
pub trait MessageExecutor<S: StateDb> {
    /// Validates `msg`, buys its gas from `pool` and executes it.
    ///
    /// An error means the message is invalid. State and pool may have been partially updated
    /// and must be restored by the caller.
    fn apply_message(
        &mut self,
        state: &mut S,
        ctx: &BlockContext,
        msg: &Message,
        pool: &mut GasPool,
    ) -> Result<MessageResult, InvalidTransaction>;
}

/// Whether a frame calls existing code or runs initcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Message call.
    Call,
    /// Contract creation.
    Create,
}

/// Top-level execution frame handed to an [`Interpreter`]. The value has already been
/// transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Call or create.
    pub kind: FrameKind,
    /// Sender of the message.
    pub caller: Address,
    /// Account whose code runs: the recipient, or the address being created.
    pub address: Address,
    /// Transferred value.
    pub value: U256,
    /// Calldata, empty for creations.
    pub input: Bytes,
    /// Code to run: the recipient's code, or the initcode.
    pub code: Bytes,
    /// Gas available to the frame.
    pub gas: u64,
}

/// How a frame ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Completed normally.
    Success,
    /// Reverted, returning the unused gas.
    Revert,
    /// Halted exceptionally, consuming all gas.
    Halt,
}

/// Result of running a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameResult {
    /// How the frame ended.
    pub status: FrameStatus,
    /// Gas consumed by the frame.
    pub gas_used: u64,
    /// Refund accumulated by the frame.
    pub gas_refund: u64,
    /// Return data, or the runtime code for creations.
    pub output: Bytes,
}

impl FrameResult {
    /// A successful frame.
    pub const fn success(gas_used: u64, output: Bytes) -> Self {
        Self { status: FrameStatus::Success, gas_used, gas_refund: 0, output }
    }

    /// A reverted frame.
    pub const fn revert(gas_used: u64, output: Bytes) -> Self {
        Self { status: FrameStatus::Revert, gas_used, gas_refund: 0, output }
    }

    /// A halted frame.
    pub const fn halt() -> Self {
        Self { status: FrameStatus::Halt, gas_used: 0, gas_refund: 0, output: Bytes::new() }
    }

    /// Sets the refund.
    pub const fn with_refund(mut self, gas_refund: u64) -> Self {
        self.gas_refund = gas_refund;
        self
    }
}

/// Runs EVM code. Interpreters write their effects, logs included, directly to the state.
pub trait Interpreter<S> {
    /// Runs `frame` against `state`.
    fn execute(&mut self, state: &mut S, ctx: &BlockContext, frame: &Frame) -> FrameResult;
}

impl<S, F> Interpreter<S> for F
where
    F: FnMut(&mut S, &BlockContext, &Frame) -> FrameResult,
{
    fn execute(&mut self, state: &mut S, ctx: &BlockContext, frame: &Frame) -> FrameResult {
        self(state, ctx, frame)
    }
}

/// Interpreter for which all code succeeds immediately, without gas or effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInterpreter;

impl<S> Interpreter<S> for NoopInterpreter {
    fn execute(&mut self, _state: &mut S, _ctx: &BlockContext, _frame: &Frame) -> FrameResult {
        FrameResult::success(0, Bytes::new())
    }
}

/// Proves the new-layout keys accessed by a block.
#[auto_impl(&, Box, Arc)]
pub trait WitnessProver {
    /// Proves `keys` against the pre-block tree `pre` and records their transition to `post`.
    fn prove(&self, pre: &StemTree, post: &StemTree, keys: &[B256]) -> Result<Witness, WitnessError>;
}
