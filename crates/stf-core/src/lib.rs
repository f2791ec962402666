//! Block state transition for Ethereum-compatible chains.
//!
//! [`TransitionExecutor`] applies the transactions of a block to a pre-state, credits rewards and
//! withdrawals, and commits the result. Chains converting from the legacy account layout to the
//! stem tree layout additionally migrate a bounded number of legacy entries per block and produce
//! a witness of the accessed keys.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;
pub mod eip4844;
pub mod state;
pub mod transition;

mod chain;
pub use chain::*;

mod env;
pub use env::*;

mod error;
pub use error::*;

mod executor;
pub use executor::*;

mod gas_pool;
pub use gas_pool::*;

mod interfaces;
pub use interfaces::*;

mod message;
pub use message::*;

mod result;
pub use result::*;

mod root;
pub use root::*;

mod witness;
pub use witness::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
