//! Scanning-engine chart scenarios.
//!
//! Builds on `chartcheck-k8s` to install the chart per [`Edition`], verify
//! each engine service over HTTP and through `anchore-cli system status`,
//! and run the functional suites: the external `tox` suite ([`suite`]) and
//! the built-in `anchore-cli` [`driver`].

pub mod deployment;
pub mod driver;
pub mod error;
pub mod http;
pub mod services;
pub mod suite;
pub mod system_status;
pub mod values;
pub mod verify;

pub use deployment::{DeploymentReport, verify_chart_deployment, verify_enterprise_ui_deployment};
pub use driver::{AnchoreCli, CliContext, CliRunner, Driver, Ledger, LedgerSummary, Suite, TestKind};
pub use error::EngineError;
pub use services::Edition;
