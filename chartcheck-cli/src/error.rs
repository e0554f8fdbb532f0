//! CLI-specific error types and exit code mapping

use chartcheck_core::error::HarnessError;
use chartcheck_engine::EngineError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The driver finished but recorded failed checks.
    #[error("driver recorded {0} failed check(s)")]
    DriverFailures(usize),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, artifacts, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Scenario failure.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                           |
    /// |------|-----------------------------------|
    /// | 0    | Success                           |
    /// | 1    | Scenario or command failure       |
    /// | 2    | Configuration error               |
    /// | 4    | Driver recorded failed checks     |
    /// | 10   | IO error                          |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::DriverFailures(_) => 4,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Engine(_) => 1,
        }
    }
}

impl From<HarnessError> for CliError {
    fn from(e: HarnessError) -> Self {
        match e {
            HarnessError::Config(e) => Self::Config(e.to_string()),
            HarnessError::Io(e) => Self::Io(e),
            other => Self::Command(other.to_string()),
        }
    }
}
