//! Readiness predicates and the waits built on them.

use std::collections::BTreeMap;
use std::time::Duration;

use chartcheck_core::{Attempt, do_with_retry};
use k8s_openapi::api::core::v1::{Endpoints, Pod, Service};
use tracing::{debug, info};

use crate::K8sError;
use crate::client::KubeClient;

/// Why a service is not ready yet, or `Ok(())` when it is.
pub fn check_service_available(
    service: &Service,
    endpoints: Option<&Endpoints>,
) -> Result<(), String> {
    let name = service.metadata.name.as_deref().unwrap_or("<unnamed>");
    let type_ = service
        .spec
        .as_ref()
        .and_then(|spec| spec.type_.as_deref())
        .unwrap_or("ClusterIP");

    if type_ == "ExternalName" {
        return Ok(());
    }

    if type_ == "LoadBalancer" {
        let has_ingress = service
            .status
            .as_ref()
            .and_then(|status| status.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .is_some_and(|ingress| !ingress.is_empty());
        if !has_ingress {
            return Err(format!("service {name} has no load balancer ingress yet"));
        }
    }

    let ready_addresses = endpoints
        .and_then(|ep| ep.subsets.as_ref())
        .map(|subsets| {
            subsets
                .iter()
                .filter_map(|subset| subset.addresses.as_ref())
                .map(Vec::len)
                .sum::<usize>()
        })
        .unwrap_or(0);
    if ready_addresses == 0 {
        return Err(format!("service {name} has no ready endpoints"));
    }

    Ok(())
}

pub fn is_service_available(service: &Service, endpoints: Option<&Endpoints>) -> bool {
    check_service_available(service, endpoints).is_ok()
}

/// Why a pod is not ready yet, or `Ok(())` when it is.
pub fn check_pod_available(pod: &Pod) -> Result<(), String> {
    let name = pod.metadata.name.as_deref().unwrap_or("<unnamed>");
    let Some(status) = pod.status.as_ref() else {
        return Err(format!("pod {name} has no status"));
    };

    let phase = status.phase.as_deref().unwrap_or("Unknown");
    if phase != "Running" {
        return Err(format!("pod {name} is {phase}"));
    }

    let not_ready: Vec<&str> = status
        .container_statuses
        .iter()
        .flatten()
        .filter(|c| !c.ready)
        .map(|c| c.name.as_str())
        .collect();
    if !not_ready.is_empty() {
        return Err(format!(
            "pod {name} has containers not ready: {}",
            not_ready.join(", ")
        ));
    }

    Ok(())
}

pub fn is_pod_available(pod: &Pod) -> bool {
    check_pod_available(pod).is_ok()
}

/// Render a selector map as `k=v,k2=v2`, keys sorted.
pub fn make_label_selector(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Poll until the service has ready endpoints (and ingress, for load balancers).
pub async fn wait_until_service_available<C: KubeClient>(
    client: &C,
    service_name: &str,
    retries: u32,
    sleep: Duration,
) -> Result<Service, K8sError> {
    let description = format!("wait for service {service_name} to be provisioned");
    let service = do_with_retry(&description, retries, sleep, || async {
        let service = client
            .get_service(service_name)
            .await
            .map_err(Attempt::retry)?;
        let is_external = service
            .spec
            .as_ref()
            .and_then(|spec| spec.type_.as_deref())
            == Some("ExternalName");
        let endpoints = if is_external {
            None
        } else {
            Some(
                client
                    .get_endpoints(service_name)
                    .await
                    .map_err(Attempt::retry)?,
            )
        };
        check_service_available(&service, endpoints.as_ref()).map_err(Attempt::Retry)?;
        Ok(service)
    })
    .await?;

    info!(service = service_name, "service is available");
    Ok(service)
}

/// Poll until the pod is running with every container ready.
pub async fn wait_until_pod_available<C: KubeClient>(
    client: &C,
    pod_name: &str,
    retries: u32,
    sleep: Duration,
) -> Result<Pod, K8sError> {
    let description = format!("wait for pod {pod_name} to be provisioned");
    let pod = do_with_retry(&description, retries, sleep, || async {
        let pod = client.get_pod(pod_name).await.map_err(Attempt::retry)?;
        check_pod_available(&pod).map_err(Attempt::Retry)?;
        Ok(pod)
    })
    .await?;

    info!(pod = pod_name, "pod is available");
    Ok(pod)
}

/// A pod selected by the service, preferring one that is already running.
pub async fn get_attachable_pod_for_service<C: KubeClient>(
    client: &C,
    service_name: &str,
) -> Result<Pod, K8sError> {
    let service = client.get_service(service_name).await?;
    let selector = service
        .spec
        .as_ref()
        .and_then(|spec| spec.selector.as_ref())
        .filter(|selector| !selector.is_empty())
        .ok_or_else(|| K8sError::NoSelector(service_name.to_owned()))?;
    let selector = make_label_selector(selector);

    let pods = client.list_pods(&selector).await?;
    debug!(service = service_name, selector = %selector, pods = pods.len(), "listed pods");

    let running = pods.iter().position(|pod| {
        pod.status
            .as_ref()
            .and_then(|status| status.phase.as_deref())
            == Some("Running")
    });
    let index = running.unwrap_or(0);
    pods.into_iter()
        .nth(index)
        .ok_or(K8sError::NoPods {
            service: service_name.to_owned(),
            selector,
        })
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus, ServiceStatus};

    use super::*;
    use crate::client::MockKubeClient;
    use crate::client::fixtures::*;

    const API: &str = "rel-anchore-engine-api";

    #[test]
    fn cluster_ip_needs_endpoints() {
        let svc = service(API, "ClusterIP", &[("app", "rel")]);
        assert!(!is_service_available(&svc, None));
        assert!(!is_service_available(&svc, Some(&endpoints(API, &[]))));
        assert!(is_service_available(&svc, Some(&endpoints(API, &["10.0.0.7"]))));
    }

    #[test]
    fn external_name_is_always_available() {
        let svc = service("ext", "ExternalName", &[]);
        assert!(is_service_available(&svc, None));
    }

    #[test]
    fn load_balancer_needs_ingress() {
        let mut svc = service(API, "LoadBalancer", &[("app", "rel")]);
        let ep = endpoints(API, &["10.0.0.7"]);
        let reason = check_service_available(&svc, Some(&ep)).unwrap_err();
        assert!(reason.contains("ingress"));

        svc.status = Some(ServiceStatus {
            load_balancer: Some(LoadBalancerStatus {
                ingress: Some(vec![LoadBalancerIngress {
                    ip: Some("203.0.113.4".to_owned()),
                    ..LoadBalancerIngress::default()
                }]),
            }),
            ..ServiceStatus::default()
        });
        assert!(is_service_available(&svc, Some(&ep)));
    }

    #[test]
    fn pod_needs_running_and_ready() {
        assert!(is_pod_available(&pod("p", &[], "Running", true)));
        assert!(!is_pod_available(&pod("p", &[], "Pending", true)));

        let reason = check_pod_available(&pod("p", &[], "Running", false)).unwrap_err();
        assert!(reason.contains("main"));
    }

    #[test]
    fn label_selector_is_sorted() {
        let selector = labels(&[("component", "api"), ("app", "rel-anchore-engine")]);
        assert_eq!(
            make_label_selector(&selector),
            "app=rel-anchore-engine,component=api"
        );
        assert_eq!(make_label_selector(&BTreeMap::new()), "");
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_service_succeeds_with_endpoints() {
        let client = MockKubeClient::new()
            .with_service(service(API, "ClusterIP", &[("app", "rel")]))
            .with_endpoints(endpoints(API, &["10.0.0.7"]));
        let svc = wait_until_service_available(&client, API, 3, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(svc.metadata.name.as_deref(), Some(API));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_missing_service_exhausts_retries() {
        let client = MockKubeClient::new();
        let err = wait_until_service_available(&client, API, 2, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, K8sError::Retry(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_pod_polls_until_ready() {
        let client = MockKubeClient::new()
            .with_pod(pod("api-0", &[], "Running", true))
            .with_pod_ready_after(3);
        let start = tokio::time::Instant::now();
        wait_until_pod_available(&client, "api-0", 5, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn attachable_pod_prefers_running() {
        let client = MockKubeClient::new()
            .with_service(service(API, "ClusterIP", &[("app", "rel"), ("component", "api")]))
            .with_pod(pod("api-old", &[("app", "rel"), ("component", "api")], "Pending", false))
            .with_pod(pod("api-new", &[("app", "rel"), ("component", "api")], "Running", true))
            .with_pod(pod("catalog", &[("app", "rel"), ("component", "catalog")], "Running", true));
        let pod = get_attachable_pod_for_service(&client, API).await.unwrap();
        assert_eq!(pod.metadata.name.as_deref(), Some("api-new"));
    }

    #[tokio::test]
    async fn attachable_pod_errors() {
        let client = MockKubeClient::new()
            .with_service(service("bare", "ClusterIP", &[]))
            .with_service(service(API, "ClusterIP", &[("app", "rel")]));

        let err = get_attachable_pod_for_service(&client, "bare").await.unwrap_err();
        assert!(matches!(err, K8sError::NoSelector(_)));

        let err = get_attachable_pod_for_service(&client, API).await.unwrap_err();
        assert!(matches!(err, K8sError::NoPods { .. }));
    }
}
