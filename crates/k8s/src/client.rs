//! Kubernetes API access for testability.
//!
//! The [`KubeClient`] trait abstracts the handful of reads the harness needs,
//! allowing production code to use [`KubectlClient`] (which shells out to
//! `kubectl ... -o json`) while tests use `MockKubeClient`.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │ readiness / tunnel │
//! └─────────┬──────────┘
//!           │
//!           ▼
//!    ┌────────────┐
//!    │ KubeClient │ (trait)
//!    └────────────┘
//!       │      │
//!       ▼      ▼
//!  ┌───────┐ ┌──────┐
//!  │kubectl│ │ Mock │
//!  └───┬───┘ └──────┘
//!      │
//!      ▼
//!  API server
//! ```
//!
//! Resources are decoded into `k8s-openapi` types so the readiness predicates
//! read the same fields the API server returns.

use std::future::Future;

use k8s_openapi::api::core::v1::{Endpoints, Pod, Service};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use chartcheck_core::shell;

use crate::error::K8sError;
use crate::options::KubectlOptions;

/// Read access to cluster resources in one namespace.
///
/// The namespace comes from [`KubeClient::options`]. Implementations are
/// `Send + Sync + 'static` so they can be shared across tasks.
pub trait KubeClient: Send + Sync + 'static {
    /// Options every call runs with.
    fn options(&self) -> &KubectlOptions;

    /// Runs `kubectl <args>` and returns stdout.
    ///
    /// With `log_output == false` the output never reaches the logs, which is
    /// required when reading secrets.
    fn run_kubectl_output(
        &self,
        args: Vec<String>,
        log_output: bool,
    ) -> impl Future<Output = Result<String, K8sError>> + Send;

    /// Fetches a Service by name.
    fn get_service(&self, name: &str) -> impl Future<Output = Result<Service, K8sError>> + Send;

    /// Fetches the Endpoints object backing a Service.
    fn get_endpoints(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Endpoints, K8sError>> + Send;

    /// Lists pods matching a label selector (`k=v,k2=v2`).
    fn list_pods(
        &self,
        label_selector: &str,
    ) -> impl Future<Output = Result<Vec<Pod>, K8sError>> + Send;

    /// Fetches a Pod by name.
    fn get_pod(&self, name: &str) -> impl Future<Output = Result<Pod, K8sError>> + Send;
}

/// `kubectl get` list output. kubectl reports `kind: List` rather than the
/// typed list kind, so only `items` is read.
#[derive(Debug, Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

fn decode<T: DeserializeOwned>(resource: &str, json: &str) -> Result<T, K8sError> {
    serde_json::from_str(json).map_err(|e| K8sError::Decode {
        resource: resource.to_owned(),
        reason: e.to_string(),
    })
}

/// Production client backed by the `kubectl` binary.
#[derive(Debug, Clone)]
pub struct KubectlClient {
    options: KubectlOptions,
}

impl KubectlClient {
    pub fn new(options: KubectlOptions) -> Self {
        Self { options }
    }

    async fn get_json<T: DeserializeOwned>(&self, kind: &str, name: &str) -> Result<T, K8sError> {
        let args = vec![
            "get".to_owned(),
            kind.to_owned(),
            name.to_owned(),
            "-o".to_owned(),
            "json".to_owned(),
        ];
        let output = self.run_kubectl_output(args, false).await?;
        decode(&format!("{kind}/{name}"), &output)
    }
}

impl KubeClient for KubectlClient {
    fn options(&self) -> &KubectlOptions {
        &self.options
    }

    async fn run_kubectl_output(
        &self,
        args: Vec<String>,
        log_output: bool,
    ) -> Result<String, K8sError> {
        let mut cmd = self.options.command(args);
        cmd.log_output = log_output;
        Ok(shell::run_command_and_get_stdout(&cmd).await?)
    }

    async fn get_service(&self, name: &str) -> Result<Service, K8sError> {
        self.get_json("service", name).await
    }

    async fn get_endpoints(&self, name: &str) -> Result<Endpoints, K8sError> {
        self.get_json("endpoints", name).await
    }

    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, K8sError> {
        let args = vec![
            "get".to_owned(),
            "pods".to_owned(),
            "--selector".to_owned(),
            label_selector.to_owned(),
            "-o".to_owned(),
            "json".to_owned(),
        ];
        let output = self.run_kubectl_output(args, false).await?;
        let list: ItemList<Pod> = decode(&format!("pods ({label_selector})"), &output)?;
        Ok(list.items)
    }

    async fn get_pod(&self, name: &str) -> Result<Pod, K8sError> {
        self.get_json("pod", name).await
    }
}

/// In-memory Kubernetes client for tests
///
/// Serves canned resources so readiness and tunnel logic run without a cluster.
#[cfg(test)]
#[derive(Default)]
pub struct MockKubeClient {
    /// Namespace and context flags
    pub options: KubectlOptions,
    /// Returned by `get_service`
    pub services: Vec<Service>,
    /// Returned by `get_endpoints`
    pub endpoints: Vec<Endpoints>,
    /// Returned by `list_pods` and `get_pod`
    pub pods: Vec<Pod>,
    /// Returned by `run_kubectl_output`
    pub kubectl_output: String,
    /// Pods only report Ready once `get_pod` has been called this many times
    pub pod_ready_after: u32,
    /// Arguments passed to `run_kubectl_output`
    pub calls: std::sync::Mutex<Vec<Vec<String>>>,
    pod_polls: std::sync::atomic::AtomicU32,
}

#[cfg(test)]
impl MockKubeClient {
    /// Empty client with default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: KubectlOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints.push(endpoints);
        self
    }

    pub fn with_pod(mut self, pod: Pod) -> Self {
        self.pods.push(pod);
        self
    }

    pub fn with_kubectl_output(mut self, output: impl Into<String>) -> Self {
        self.kubectl_output = output.into();
        self
    }

    /// Report pods as Ready starting with the n-th `get_pod` call.
    pub fn with_pod_ready_after(mut self, polls: u32) -> Self {
        self.pod_ready_after = polls;
        self
    }

    /// Recorded `run_kubectl_output` calls
    pub fn recorded_calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn not_found(kind: &str, name: &str) -> K8sError {
        K8sError::Command(chartcheck_core::CommandError::Failed {
            command: format!("kubectl get {kind} {name}"),
            status: "exit status: 1".to_owned(),
            output: format!("Error from server (NotFound): {kind} \"{name}\" not found"),
        })
    }
}

#[cfg(test)]
fn selector_matches(pod: &Pod, label_selector: &str) -> bool {
    let labels = pod.metadata.labels.clone().unwrap_or_default();
    label_selector
        .split(',')
        .filter(|pair| !pair.is_empty())
        .all(|pair| match pair.split_once('=') {
            Some((k, v)) => labels.get(k).map(String::as_str) == Some(v),
            None => false,
        })
}

#[cfg(test)]
impl KubeClient for MockKubeClient {
    fn options(&self) -> &KubectlOptions {
        &self.options
    }

    async fn run_kubectl_output(
        &self,
        args: Vec<String>,
        _log_output: bool,
    ) -> Result<String, K8sError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(args);
        }
        Ok(self.kubectl_output.clone())
    }

    async fn get_service(&self, name: &str) -> Result<Service, K8sError> {
        self.services
            .iter()
            .find(|s| s.metadata.name.as_deref() == Some(name))
            .cloned()
            .ok_or_else(|| Self::not_found("service", name))
    }

    async fn get_endpoints(&self, name: &str) -> Result<Endpoints, K8sError> {
        self.endpoints
            .iter()
            .find(|e| e.metadata.name.as_deref() == Some(name))
            .cloned()
            .ok_or_else(|| Self::not_found("endpoints", name))
    }

    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, K8sError> {
        Ok(self
            .pods
            .iter()
            .filter(|p| selector_matches(p, label_selector))
            .cloned()
            .collect())
    }

    async fn get_pod(&self, name: &str) -> Result<Pod, K8sError> {
        use std::sync::atomic::Ordering;

        let polls = self.pod_polls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut pod = self
            .pods
            .iter()
            .find(|p| p.metadata.name.as_deref() == Some(name))
            .cloned()
            .ok_or_else(|| Self::not_found("pod", name))?;
        if polls < self.pod_ready_after {
            if let Some(status) = pod.status.as_mut() {
                status.phase = Some("Pending".to_owned());
            }
        }
        Ok(pod)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Resource builders for tests

    use std::collections::BTreeMap;

    use k8s_openapi::api::core::v1::{
        ContainerStatus, EndpointAddress, EndpointSubset, Endpoints, Pod, PodStatus, Service,
        ServiceSpec,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    pub fn service(name: &str, type_: &str, selector: &[(&str, &str)]) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                ..ObjectMeta::default()
            },
            spec: Some(ServiceSpec {
                type_: Some(type_.to_owned()),
                selector: if selector.is_empty() {
                    None
                } else {
                    Some(labels(selector))
                },
                ..ServiceSpec::default()
            }),
            ..Service::default()
        }
    }

    pub fn endpoints(name: &str, ready_ips: &[&str]) -> Endpoints {
        Endpoints {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                ..ObjectMeta::default()
            },
            subsets: Some(vec![EndpointSubset {
                addresses: Some(
                    ready_ips
                        .iter()
                        .map(|ip| EndpointAddress {
                            ip: (*ip).to_owned(),
                            ..EndpointAddress::default()
                        })
                        .collect(),
                ),
                ..EndpointSubset::default()
            }]),
        }
    }

    pub fn pod(name: &str, pod_labels: &[(&str, &str)], phase: &str, ready: bool) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                labels: Some(labels(pod_labels)),
                ..ObjectMeta::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.to_owned()),
                container_statuses: Some(vec![ContainerStatus {
                    name: "main".to_owned(),
                    ready,
                    ..ContainerStatus::default()
                }]),
                ..PodStatus::default()
            }),
            ..Pod::default()
        }
    }
}
