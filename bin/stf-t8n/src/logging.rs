//! Logging configuration for the stf-t8n CLI tool.
//!
//! Verbosity comes from `-v` flags unless `RUST_LOG` is set. Logs go to stderr, or to the file
//! given with `--log.file`.

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Logging configuration arguments.
#[derive(Debug, Clone, Default, Parser)]
pub struct LogArgs {
    /// Increase logging verbosity (-v = error, -vv = warn, -vvv = info, -vvvv = debug, -vvvvv =
    /// trace)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log file path. If specified, logs are written to this file instead of stderr.
    #[arg(long = "log.file", visible_aliases = ["log-file"], global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable colorful console logging. Only applies when logging to stderr (no --log.file).
    #[arg(long = "log.no-color", visible_aliases = ["log-no-color"], global = true)]
    pub log_no_color: bool,
}

impl LogArgs {
    /// Returns the filter selected by `RUST_LOG` or, when unset, by the verbosity flags.
    pub fn filter(&self) -> EnvFilter {
        if std::env::var("RUST_LOG").is_ok() {
            return EnvFilter::from_default_env();
        }
        match self.level() {
            Some(level) => EnvFilter::new(format!("stf_t8n={level},stf_core={level}")),
            None => EnvFilter::new("off"),
        }
    }

    /// Returns the level selected by the verbosity flags, `None` for no logging.
    pub const fn level(&self) -> Option<Level> {
        match self.verbose {
            0 => None,
            1 => Some(Level::ERROR),
            2 => Some(Level::WARN),
            3 => Some(Level::INFO),
            4 => Some(Level::DEBUG),
            _ => Some(Level::TRACE),
        }
    }

    /// Installs the global tracing subscriber.
    ///
    /// The log target is only shown from DEBUG on. A log file that cannot be created falls back
    /// to stderr.
    pub fn init(&self) {
        let show_target = self.verbose >= 4;
        let builder = fmt().with_env_filter(self.filter()).with_target(show_target);

        if let Some(log_file) = &self.log_file {
            match std::fs::File::create(log_file) {
                Ok(file) => {
                    builder.with_writer(file).with_ansi(false).init();
                    return;
                }
                Err(err) => eprintln!("Failed to create log file {}: {err}", log_file.display()),
            }
        }
        builder.with_writer(std::io::stderr).with_ansi(!self.log_no_color).init();
    }
}
