//! Scenarios against a live cluster.
//!
//! Need `kubectl`, `helm`, `tox` and `anchore-cli` on `PATH`, a reachable
//! cluster with the pull and license secrets in the source namespace, and
//! the chart checked out at `chart.path`. Run with
//! `cargo test -p chartcheck-engine --test cluster -- --ignored`.
//!
//! Configuration comes from `CHARTCHECK_CONFIG` (default `chartcheck.toml`,
//! falling back to defaults) plus the usual `CHARTCHECK_*` overrides.

use std::sync::Once;

use chartcheck_core::HarnessConfig;
use chartcheck_engine::{
    Edition, EngineError, verify_chart_deployment, verify_enterprise_ui_deployment,
};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();
    });
}

async fn config() -> HarnessConfig {
    let path = std::env::var("CHARTCHECK_CONFIG").unwrap_or_else(|_| "chartcheck.toml".to_owned());
    HarnessConfig::load_or_default(&path)
        .await
        .expect("failed to load harness config")
}

async fn deploy(edition: Edition) -> Result<(), EngineError> {
    init_tracing();
    let config = config().await;
    let report = verify_chart_deployment(&config, edition.default_test_name(), edition).await?;
    assert_eq!(report.services.len(), 4);
    assert_eq!(report.system_status_checked, config.suite.system_status);
    assert_eq!(report.tox_log.is_some(), !config.suite.short);
    Ok(())
}

#[tokio::test]
#[ignore = "needs a Kubernetes cluster, kubectl and helm"]
async fn engine_chart_deploys_and_passes_suite() -> Result<(), EngineError> {
    deploy(Edition::Engine).await
}

#[tokio::test]
#[ignore = "needs a Kubernetes cluster, kubectl and helm"]
async fn enterprise_chart_deploys_and_passes_suite() -> Result<(), EngineError> {
    deploy(Edition::Enterprise).await
}

#[tokio::test]
#[ignore = "needs a Kubernetes cluster, kubectl and helm"]
async fn enterprise_ui_serves_landing_page() -> Result<(), EngineError> {
    init_tracing();
    let config = config().await;
    let report = verify_enterprise_ui_deployment(&config, "enterprise-ui-test").await?;
    assert_eq!(report.services.len(), 1);
    Ok(())
}
