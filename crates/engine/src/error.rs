//! Engine verification errors
//!
//! [`EngineError`] covers deployment scenarios, HTTP checks and the
//! `anchore-cli`/`tox` runs. It converts into [`HarnessError`] for callers
//! that only deal with the core error.

use chartcheck_core::error::{CommandError, HarnessError, RetryError};
use chartcheck_k8s::K8sError;

/// Errors raised while verifying a deployed chart
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A kubectl or helm operation failed
    #[error(transparent)]
    K8s(#[from] K8sError),

    /// An external command (`anchore-cli`, `tox`) failed
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Retries exhausted or a fatal check result
    #[error(transparent)]
    Retry(#[from] RetryError),

    /// The HTTP request itself failed
    #[error("http request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    /// A deployed service answered, but not as expected
    #[error("verification failed: {0}")]
    Verification(String),

    /// The tox suite failed; its output is in the log file
    #[error("tox tests failed ({status}); output written to {log_path}")]
    Tox { status: String, log_path: String },

    /// Writing the log file failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EngineError> for HarnessError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::K8s(e) => e.into(),
            EngineError::Command(e) => HarnessError::Command(e),
            EngineError::Retry(e) => HarnessError::Retry(e),
            EngineError::Io(e) => HarnessError::Io(e),
            other => HarnessError::Verification(other.to_string()),
        }
    }
}
