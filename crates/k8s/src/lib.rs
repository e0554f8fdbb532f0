//! Kubernetes plumbing for chartcheck scenarios.
//!
//! Everything here drives the `kubectl` and `helm` binaries:
//!
//! - [`namespace`] / [`helm`]: resources brought up by a [`lifecycle::Manager`]
//!   and torn down when it drops
//! - [`readiness`]: service and pod readiness polling
//! - [`tunnel`]: `kubectl port-forward` with local port discovery
//! - [`secrets`]: pull/license secret copy between namespaces

pub mod client;
pub mod error;
pub mod helm;
pub mod lifecycle;
pub mod namespace;
pub mod options;
pub mod readiness;
pub mod secrets;
pub mod tunnel;

pub use client::{KubeClient, KubectlClient};
pub use error::K8sError;
pub use helm::HelmOptions;
pub use lifecycle::Manager;
pub use options::KubectlOptions;
pub use tunnel::{ResourceType, Tunnel};
