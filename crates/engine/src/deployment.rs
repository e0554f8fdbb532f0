//! End-to-end chart deployment scenarios.
//!
//! Each scenario provisions its own namespace and release and tears them down
//! in reverse order: tunnel, release, namespace. Teardown runs on success
//! through the async `down` calls and on any early return through the
//! managers' `Drop`. With `chart.persist` set nothing is torn down.

use std::path::{Path, PathBuf};

use chartcheck_core::HarnessConfig;
use chartcheck_core::random::unique_name;
use chartcheck_k8s::namespace::create_namespace;
use chartcheck_k8s::readiness::wait_until_service_available;
use chartcheck_k8s::secrets::{attach_pull_secret, copy_secret};
use chartcheck_k8s::tunnel::create_tunnel_from_service;
use chartcheck_k8s::{HelmOptions, KubectlClient, KubectlOptions, helm};
use serde::Serialize;
use tracing::{info, info_span, Instrument};

use crate::EngineError;
use crate::services::{
    ENGINE_API_PORT, Edition, SYSTEM_STATUS_SERVICES, api_service_name,
    enterprise_ui_service_name, service_names,
};
use crate::suite::{cli_env, run_tox};
use crate::system_status::verify_engine_system_status;
use crate::values::ui_values;
use crate::verify::{verify_engine_service_health, verify_engine_service_status, verify_enterprise_ui};

/// What a finished scenario provisioned and checked.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub scenario: String,
    pub namespace: String,
    pub release: String,
    pub services: Vec<String>,
    pub system_status_checked: bool,
    pub tox_log: Option<PathBuf>,
    pub persisted: bool,
}

fn tox_log_path(artifacts_dir: &str, edition: Edition) -> PathBuf {
    Path::new(artifacts_dir).join(edition.tox_log_name())
}

/// Install the chart for `edition` and verify every engine service.
pub async fn verify_chart_deployment(
    config: &HarnessConfig,
    test_name: &str,
    edition: Edition,
) -> Result<DeploymentReport, EngineError> {
    let namespace = unique_name(test_name);
    let span = info_span!("deployment", edition = %edition, namespace = %namespace);
    run_chart_deployment(config, test_name, edition, namespace)
        .instrument(span)
        .await
}

async fn run_chart_deployment(
    config: &HarnessConfig,
    test_name: &str,
    edition: Edition,
    namespace: String,
) -> Result<DeploymentReport, EngineError> {
    let persist = config.chart.persist;
    let cluster = &config.cluster;
    let base = KubectlOptions::from_config(cluster);

    let mut namespace_manager = create_namespace(&base, &namespace).await?;
    if persist {
        namespace_manager.persist();
    }

    copy_secret(&base, &cluster.pull_secret, &cluster.source_namespace, &namespace).await?;
    attach_pull_secret(&base, &namespace, &cluster.pull_secret).await?;
    if edition.is_enterprise() {
        copy_secret(&base, &cluster.license_secret, &cluster.source_namespace, &namespace).await?;
    }

    let scoped = base.with_namespace(&namespace);
    let release = unique_name(test_name);
    let helm_options = HelmOptions::new(scoped.clone()).with_set_values(edition.values(&config.images));
    let mut release_manager = helm::install(helm_options, &config.chart.path, &release).await?;
    if persist {
        release_manager.persist();
    }

    let client = KubectlClient::new(scoped);
    let wait = &config.wait;
    let services = service_names(&release);
    for (component, service) in &services {
        wait_until_service_available(&client, service, wait.service_retries, wait.sleep()).await?;
        if service.contains("api") {
            verify_engine_service_status(&client, service, wait).await?;
        } else if wait.check_component_health {
            verify_engine_service_health(&client, service, wait).await?;
        }
        info!(component, service = %service, "service verified");
    }

    let api = api_service_name(&release);
    let mut tunnel = create_tunnel_from_service(&client, &api, ENGINE_API_PORT, wait).await?;
    tunnel.forward_port(wait.tunnel_timeout()).await?;
    let env = cli_env(&tunnel.endpoint()?, &config.cli.user, &config.cli.password);

    let system_status_checked = config.suite.system_status;
    if system_status_checked {
        verify_engine_system_status(SYSTEM_STATUS_SERVICES, &env, wait).await?;
    }

    let tox_log = if config.suite.short {
        info!("short mode, skipping tox suite");
        None
    } else {
        let path = tox_log_path(&config.general.artifacts_dir, edition);
        run_tox(&env, &config.suite.tox_args, &path).await?;
        Some(path)
    };

    tunnel.close().await;
    if release_manager.needs_drop() {
        release_manager.down().await?;
    }
    if namespace_manager.needs_drop() {
        namespace_manager.down().await?;
    }

    Ok(DeploymentReport {
        scenario: test_name.to_owned(),
        namespace,
        release,
        services: services.into_values().collect(),
        system_status_checked,
        tox_log,
        persisted: persist,
    })
}

/// Install the chart with enterprise enabled and check the UI landing page.
pub async fn verify_enterprise_ui_deployment(
    config: &HarnessConfig,
    test_name: &str,
) -> Result<DeploymentReport, EngineError> {
    let namespace = unique_name(test_name);
    let span = info_span!("ui_deployment", namespace = %namespace);
    run_ui_deployment(config, test_name, namespace)
        .instrument(span)
        .await
}

async fn run_ui_deployment(
    config: &HarnessConfig,
    test_name: &str,
    namespace: String,
) -> Result<DeploymentReport, EngineError> {
    let persist = config.chart.persist;
    let base = KubectlOptions::from_config(&config.cluster);

    let mut namespace_manager = create_namespace(&base, &namespace).await?;
    if persist {
        namespace_manager.persist();
    }

    let scoped = base.with_namespace(&namespace);
    let release = unique_name(test_name);
    let helm_options = HelmOptions::new(scoped.clone()).with_set_values(ui_values());
    let mut release_manager = helm::install(helm_options, &config.chart.path, &release).await?;
    if persist {
        release_manager.persist();
    }

    let client = KubectlClient::new(scoped);
    let service = enterprise_ui_service_name(&release);
    verify_enterprise_ui(&client, &service, &config.wait).await?;

    if release_manager.needs_drop() {
        release_manager.down().await?;
    }
    if namespace_manager.needs_drop() {
        namespace_manager.down().await?;
    }

    Ok(DeploymentReport {
        scenario: test_name.to_owned(),
        namespace,
        release,
        services: vec![service],
        system_status_checked: false,
        tox_log: None,
        persisted: persist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tox_log_lands_in_artifacts_dir() {
        assert_eq!(
            tox_log_path("target/artifacts", Edition::Engine),
            PathBuf::from("target/artifacts/engine_tests.log")
        );
        assert_eq!(
            tox_log_path(".", Edition::Enterprise),
            PathBuf::from("./enterprise_tests.log")
        );
    }

    #[test]
    fn report_serializes_for_json_output() {
        let report = DeploymentReport {
            scenario: "engine-test".to_owned(),
            namespace: "engine-test-a1b2c3".to_owned(),
            release: "engine-test-d4e5f6".to_owned(),
            services: vec!["engine-test-d4e5f6-anchore-engine-api".to_owned()],
            system_status_checked: true,
            tox_log: None,
            persisted: false,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["namespace"], "engine-test-a1b2c3");
        assert!(json["tox_log"].is_null());
    }
}
