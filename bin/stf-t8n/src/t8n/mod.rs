//! T8N (state transition) tool implementation
//!
//! This module contains command parsing, input loading, conversion of the JSON inputs into the
//! executor's types and the output of the results.

/// Command-line interface and main logic for T8N tool
pub mod cmd;
/// Error types and handling for T8N operations
mod error;
/// Input/output operations for loading and saving state data
mod io;
/// Type definitions for T8N data structures
mod types;
/// Utility functions for conversions between the JSON inputs and the executor
mod utils;

pub use cmd::*;
pub use error::*;
pub use io::*;
pub use types::*;
pub use utils::*;
