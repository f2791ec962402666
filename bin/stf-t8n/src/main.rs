//! `stf-t8n`: applies a block of transactions to a pre-state and reports the post-state.

use std::process::ExitCode;

use clap::Parser;
use stf_t8n::MainCmd;

fn main() -> ExitCode {
    let cmd = MainCmd::parse();
    cmd.log_args().init();
    match cmd.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
