//! Execution of messages, transactions and whole blocks.

mod apply;
mod block;
mod message;
mod rewards;

pub use apply::{BlockTransaction, TransactionApplier};
pub use block::TransitionExecutor;
pub use message::{intrinsic_gas, EthMessageExecutor};
pub use rewards::{apply_dao_fork, apply_rewards, apply_withdrawals, miner_reward, ommer_reward};
