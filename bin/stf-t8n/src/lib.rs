//! State transition tool for Ethereum blocks.
//!
//! Reads a pre-state allocation, a block environment and a list of transactions, executes the
//! block with [`stf_core::TransitionExecutor`] and writes the result, the post-state and the
//! block body.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod cmd;
pub use cmd::*;

/// Logging setup.
pub mod logging;

/// T8N (state transition) command.
pub mod t8n;
