//! Deployment editions and the service names a release creates.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chartcheck_core::config::ImageConfig;
use serde::Serialize;

use crate::values::{engine_values, enterprise_values};

/// Port the engine API (and every engine component) listens on.
pub const ENGINE_API_PORT: u16 = 8228;

/// Port the enterprise UI serves on.
pub const ENTERPRISE_UI_PORT: u16 = 80;

/// Component names as `anchore-cli system status` reports them.
pub const SYSTEM_STATUS_SERVICES: &[&str] = &[
    "analyzer",
    "apiext",
    "catalog",
    "policy_engine",
    "simplequeue",
];

/// Chart flavour under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    Engine,
    Enterprise,
}

impl Edition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Engine => "engine",
            Self::Enterprise => "enterprise",
        }
    }

    /// Default scenario name, used as the namespace and release prefix.
    pub fn default_test_name(&self) -> &'static str {
        match self {
            Self::Engine => "engine-test",
            Self::Enterprise => "enterprise-test",
        }
    }

    /// File the tox suite output is written to.
    pub fn tox_log_name(&self) -> String {
        format!("{}_tests.log", self.as_str())
    }

    pub fn values(&self, images: &ImageConfig) -> BTreeMap<String, String> {
        match self {
            Self::Engine => engine_values(images),
            Self::Enterprise => enterprise_values(images),
        }
    }

    pub fn is_enterprise(&self) -> bool {
        matches!(self, Self::Enterprise)
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Edition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "engine" => Ok(Self::Engine),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(format!("unknown edition '{other}' (expected engine or enterprise)")),
        }
    }
}

/// Component -> service name for every engine service of `release`.
///
/// Keys are ordered, so callers walk services in the same order every run.
pub fn service_names(release: &str) -> BTreeMap<&'static str, String> {
    [
        ("api", "api"),
        ("catalog", "catalog"),
        ("policy-engine", "policy"),
        ("simplequeue", "simplequeue"),
    ]
    .into_iter()
    .map(|(component, suffix)| (component, format!("{release}-anchore-engine-{suffix}")))
    .collect()
}

/// The API service of `release`.
pub fn api_service_name(release: &str) -> String {
    format!("{release}-anchore-engine-api")
}

/// The enterprise UI service of `release`.
pub fn enterprise_ui_service_name(release: &str) -> String {
    format!("{release}-anchore-engine-enterprise-ui")
}
