use clap::Parser;

use crate::{logging::LogArgs, t8n::T8nError};

/// Main command enumeration for the stf-t8n CLI tool
#[derive(Parser, Debug)]
#[command(infer_subcommands = true, version)]
pub enum MainCmd {
    /// State transition tool
    T8n(crate::t8n::Cmd),
}

impl MainCmd {
    /// Returns the logging configuration of the selected command.
    pub const fn log_args(&self) -> &LogArgs {
        match self {
            Self::T8n(cmd) => &cmd.log,
        }
    }

    /// Execute the main command
    pub fn run(&self) -> Result<(), T8nError> {
        match self {
            Self::T8n(cmd) => cmd.run(),
        }
    }
}
