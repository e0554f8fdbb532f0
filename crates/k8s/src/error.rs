//! Kubernetes harness error types
//!
//! [`K8sError`] covers every failure raised while driving `kubectl` and `helm`.
//! `From<K8sError> for HarnessError` lets scenario code propagate with `?`.

use chartcheck_core::error::{CommandError, HarnessError, RetryError};

/// Errors raised by cluster operations.
#[derive(Debug, thiserror::Error)]
pub enum K8sError {
    /// `kubectl` or `helm` failed to run or exited non-zero.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// A readiness wait gave up.
    #[error(transparent)]
    Retry(#[from] RetryError),

    /// `kubectl -o json` output could not be decoded.
    #[error("failed to decode {resource}: {reason}")]
    Decode { resource: String, reason: String },

    /// A service selects no pods.
    #[error("no pods found for service '{service}' (selector: {selector})")]
    NoPods { service: String, selector: String },

    /// A service has no selector, so no pod can be attached.
    #[error("service '{0}' has no pod selector")]
    NoSelector(String),

    /// Port-forward could not be established or is not running.
    #[error("tunnel to {target} failed: {reason}")]
    Tunnel { target: String, reason: String },

    /// A manifest could not be rewritten.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Local file handling (temp manifests).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<K8sError> for HarnessError {
    fn from(err: K8sError) -> Self {
        match err {
            K8sError::Command(e) => HarnessError::Command(e),
            K8sError::Retry(e) => HarnessError::Retry(e),
            K8sError::Io(e) => HarnessError::Io(e),
            other => HarnessError::Cluster(other.to_string()),
        }
    }
}
