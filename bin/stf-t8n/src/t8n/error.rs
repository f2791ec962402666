use stf_core::{BlockExecutionError, StateError, UnknownForkError};

/// Exit code of an invalid configuration.
pub const EXIT_CONFIG: u8 = 3;
/// Exit code of a block that requested an unknown block hash.
pub const EXIT_MISSING_BLOCKHASH: u8 = 4;
/// Exit code of a failed block execution.
pub const EXIT_EXECUTION: u8 = 2;
/// Exit code of malformed JSON input.
pub const EXIT_JSON: u8 = 10;
/// Exit code of an I/O failure.
pub const EXIT_IO: u8 = 11;
/// Exit code of malformed RLP input.
pub const EXIT_RLP: u8 = 12;

/// Custom error type for t8n operations
#[derive(Debug, thiserror::Error)]
pub enum T8nError {
    /// Failed to load an input file
    #[error("Failed to load input file '{file}': {source}")]
    InputLoad {
        /// The file path that failed to load
        file: String,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// Failed to parse JSON content
    #[error("Failed to parse JSON from '{file}': {source}")]
    JsonParse {
        /// The file path where JSON parsing failed
        file: String,
        /// The underlying JSON parsing error
        source: serde_json::Error,
    },

    /// Failed to decode RLP content
    #[error("Failed to decode RLP from '{file}': {source}")]
    RlpDecode {
        /// The file path where decoding failed
        file: String,
        /// The underlying RLP error
        source: alloy_rlp::Error,
    },

    /// Failed to write an output file
    #[error("Failed to write output file '{file}': {source}")]
    OutputWrite {
        /// The file path that failed to write
        file: String,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// Invalid fork specification provided
    #[error("Invalid fork specification: {0}")]
    InvalidFork(#[from] UnknownForkError),

    /// Invalid block environment provided
    #[error("Invalid block environment: {0}")]
    InvalidEnv(String),

    /// The pre-state could not be built
    #[error("Invalid pre-state: {0}")]
    PreState(#[from] StateError),

    /// Block execution failed
    #[error("Block execution failed: {0}")]
    Execution(#[from] BlockExecutionError),
}

impl T8nError {
    /// Returns the process exit code reporting this error.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InputLoad { .. } | Self::OutputWrite { .. } => EXIT_IO,
            Self::JsonParse { .. } => EXIT_JSON,
            Self::RlpDecode { .. } => EXIT_RLP,
            Self::InvalidFork(_) | Self::InvalidEnv(_) | Self::PreState(_) => EXIT_CONFIG,
            Self::Execution(BlockExecutionError::MissingBlockhash { .. }) => EXIT_MISSING_BLOCKHASH,
            Self::Execution(_) => EXIT_EXECUTION,
        }
    }
}

/// Result type alias for T8N operations
pub type Result<T> = std::result::Result<T, T8nError>;
