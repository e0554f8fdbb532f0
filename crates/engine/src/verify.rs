//! Probes that a deployed service answers through a tunnel.

use chartcheck_core::config::WaitConfig;
use chartcheck_k8s::readiness::{
    get_attachable_pod_for_service, wait_until_pod_available, wait_until_service_available,
};
use chartcheck_k8s::tunnel::create_tunnel_from_service;
use chartcheck_k8s::{KubeClient, ResourceType, Tunnel};
use tracing::info;

use crate::EngineError;
use crate::http::http_get_with_retry_with_custom_validation;
use crate::services::{ENGINE_API_PORT, ENTERPRISE_UI_PORT};

/// API root answers 200 with a body naming the `v1` API.
pub fn api_status_ok(status: u16, body: &str) -> bool {
    status == 200 && body.contains("v1")
}

pub fn health_ok(status: u16, _body: &str) -> bool {
    status == 200
}

/// UI landing page answers 200 and mentions anchore.
pub fn ui_ok(status: u16, body: &str) -> bool {
    status == 200 && body.contains("anchore")
}

async fn open_engine_tunnel<C: KubeClient>(
    client: &C,
    service_name: &str,
    wait: &WaitConfig,
) -> Result<Tunnel, EngineError> {
    let mut tunnel = create_tunnel_from_service(client, service_name, ENGINE_API_PORT, wait).await?;
    tunnel.forward_port(wait.tunnel_timeout()).await?;
    Ok(tunnel)
}

/// Tunnel to the service and, for the API service, probe `/v1/`.
pub async fn verify_engine_service_status<C: KubeClient>(
    client: &C,
    service_name: &str,
    wait: &WaitConfig,
) -> Result<(), EngineError> {
    let mut tunnel = open_engine_tunnel(client, service_name, wait).await?;
    if service_name.contains("api") {
        let url = format!("http://{}/v1/", tunnel.endpoint()?);
        info!(service = service_name, url = %url, "checking engine API");
        let result = http_get_with_retry_with_custom_validation(
            &url,
            wait.service_retries,
            wait.sleep(),
            api_status_ok,
        )
        .await;
        tunnel.close().await;
        result?;
    } else {
        tunnel.close().await;
    }
    Ok(())
}

/// Tunnel to the service and probe `/health`.
pub async fn verify_engine_service_health<C: KubeClient>(
    client: &C,
    service_name: &str,
    wait: &WaitConfig,
) -> Result<(), EngineError> {
    let mut tunnel = open_engine_tunnel(client, service_name, wait).await?;
    let url = format!("http://{}/health", tunnel.endpoint()?);
    info!(service = service_name, url = %url, "checking service health");
    let result =
        http_get_with_retry_with_custom_validation(&url, wait.service_retries, wait.sleep(), health_ok)
            .await;
    tunnel.close().await;
    result.map(|_| ())
}

/// Wait for the UI service and its pod, tunnel to port 80 and check the landing page.
pub async fn verify_enterprise_ui<C: KubeClient>(
    client: &C,
    service_name: &str,
    wait: &WaitConfig,
) -> Result<(), EngineError> {
    let retries = wait.pod_retries;
    wait_until_service_available(client, service_name, retries, wait.sleep()).await?;

    let mut tunnel = Tunnel::new(
        client.options(),
        ResourceType::Service,
        service_name,
        0,
        ENTERPRISE_UI_PORT,
    );
    let pod = get_attachable_pod_for_service(client, service_name).await?;
    let pod_name = pod.metadata.name.unwrap_or_default();
    info!(service = service_name, pod = %pod_name, "waiting for UI pod");
    wait_until_pod_available(client, &pod_name, retries, wait.sleep()).await?;
    tunnel.forward_port(wait.tunnel_timeout()).await?;

    let url = format!("http://{}", tunnel.endpoint()?);
    let result = http_get_with_retry_with_custom_validation(&url, retries, wait.sleep(), ui_ok).await;
    tunnel.close().await;
    result.map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_validation() {
        assert!(api_status_ok(200, r#"{"v1": "api"}"#));
        assert!(!api_status_ok(200, "ok"));
        assert!(!api_status_ok(503, "v1"));
    }

    #[test]
    fn health_validation_ignores_body() {
        assert!(health_ok(200, ""));
        assert!(!health_ok(500, "healthy"));
    }

    #[test]
    fn ui_validation() {
        assert!(ui_ok(200, "<title>anchore enterprise</title>"));
        assert!(!ui_ok(200, "<title>nginx</title>"));
        assert!(!ui_ok(404, "anchore"));
    }
}
