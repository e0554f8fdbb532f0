//! Port-forward tunnels into the cluster.
//!
//! A [`Tunnel`] wraps a `kubectl port-forward` child process. The local port
//! is learned from the `Forwarding from 127.0.0.1:PORT -> REMOTE` line kubectl
//! prints once the listener is up, so a local port of `0` lets kubectl choose
//! a free one.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use chartcheck_core::ShellCommand;
use chartcheck_core::config::WaitConfig;
use chartcheck_core::shell;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::K8sError;
use crate::client::KubeClient;
use crate::options::KubectlOptions;
use crate::readiness::{
    get_attachable_pod_for_service, wait_until_pod_available, wait_until_service_available,
};

const FORWARDING_PREFIX: &str = "Forwarding from ";

/// Kind of resource a tunnel targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Pod,
    Service,
    Deployment,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pod => "pod",
            Self::Service => "service",
            Self::Deployment => "deployment",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A port-forward from `127.0.0.1` to a port of a cluster resource.
///
/// The child process is killed on [`close`](Tunnel::close) or when the tunnel
/// is dropped.
#[derive(Debug)]
pub struct Tunnel {
    options: KubectlOptions,
    resource_type: ResourceType,
    resource_name: String,
    local_port: u16,
    remote_port: u16,
    child: Option<Child>,
    local_addr: Option<SocketAddr>,
}

impl Tunnel {
    /// Describe a tunnel. Nothing runs until [`forward_port`](Tunnel::forward_port).
    pub fn new(
        options: &KubectlOptions,
        resource_type: ResourceType,
        resource_name: impl Into<String>,
        local_port: u16,
        remote_port: u16,
    ) -> Self {
        Self {
            options: options.clone(),
            resource_type,
            resource_name: resource_name.into(),
            local_port,
            remote_port,
            child: None,
            local_addr: None,
        }
    }

    /// `TYPE/NAME`
    pub fn target(&self) -> String {
        format!("{}/{}", self.resource_type, self.resource_name)
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// The `kubectl port-forward` invocation for this tunnel.
    pub fn command(&self) -> ShellCommand {
        let ports = if self.local_port == 0 {
            format!(":{}", self.remote_port)
        } else {
            format!("{}:{}", self.local_port, self.remote_port)
        };
        self.options.command([
            "port-forward".to_owned(),
            self.target(),
            ports,
            "--address".to_owned(),
            "127.0.0.1".to_owned(),
        ])
    }

    /// Start the port-forward and wait until kubectl reports the listener.
    pub async fn forward_port(&mut self, timeout: Duration) -> Result<(), K8sError> {
        let command = self.command();
        self.forward_with(&command, timeout).await
    }

    async fn forward_with(&mut self, command: &ShellCommand, timeout: Duration) -> Result<(), K8sError> {
        let target = self.target();
        let mut child = shell::spawn(command)?;

        let stdout = child.stdout.take().ok_or_else(|| K8sError::Tunnel {
            target: target.clone(),
            reason: "stdout not captured".to_owned(),
        })?;
        if let Some(stderr) = child.stderr.take() {
            let target = target.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(resource = %target, "port-forward: {line}");
                }
            });
        }

        let mut lines = BufReader::new(stdout).lines();
        let wait_for_listener = async {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        debug!(resource = %target, "port-forward: {line}");
                        if let Some(addr) = parse_forwarding_line(&line) {
                            return Ok(addr);
                        }
                    }
                    Ok(None) => return Err("port-forward exited before listening".to_owned()),
                    Err(e) => return Err(e.to_string()),
                }
            }
        };

        let addr = match tokio::time::timeout(timeout, wait_for_listener).await {
            Ok(Ok(addr)) => addr,
            Ok(Err(reason)) => return Err(K8sError::Tunnel { target, reason }),
            Err(_) => {
                return Err(K8sError::Tunnel {
                    target,
                    reason: format!("no listener after {timeout:?}"),
                });
            }
        };

        // keep the pipe drained so kubectl never blocks on a full stdout
        let drain_target = target.clone();
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(resource = %drain_target, "port-forward: {line}");
            }
        });

        info!(resource = %target, local = %addr, remote = self.remote_port, "tunnel open");
        self.child = Some(child);
        self.local_addr = Some(addr);
        Ok(())
    }

    /// Local address of an open tunnel.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// `127.0.0.1:PORT` of an open tunnel.
    pub fn endpoint(&self) -> Result<String, K8sError> {
        self.local_addr
            .map(|addr| addr.to_string())
            .ok_or_else(|| K8sError::Tunnel {
                target: self.target(),
                reason: "tunnel is not open".to_owned(),
            })
    }

    /// Kill the port-forward process and wait for it to exit.
    pub async fn close(&mut self) {
        self.local_addr = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!(resource = %self.target(), error = %e, "failed to stop port-forward");
            } else {
                info!(resource = %self.target(), "tunnel closed");
            }
        }
    }
}

/// Local address from a `Forwarding from 127.0.0.1:PORT -> REMOTE` line.
pub fn parse_forwarding_line(line: &str) -> Option<SocketAddr> {
    let rest = line.trim().strip_prefix(FORWARDING_PREFIX)?;
    let (local, _remote) = rest.split_once(" -> ")?;
    local.trim().parse().ok()
}

/// Wait for the service and one of its pods, then describe a tunnel to the
/// service. The tunnel still has to be opened with `forward_port`.
pub async fn create_tunnel_from_service<C: KubeClient>(
    client: &C,
    service_name: &str,
    remote_port: u16,
    wait: &WaitConfig,
) -> Result<Tunnel, K8sError> {
    wait_until_service_available(client, service_name, wait.pod_retries, wait.sleep()).await?;
    let pod = get_attachable_pod_for_service(client, service_name).await?;
    let pod_name = pod.metadata.name.unwrap_or_default();
    wait_until_pod_available(client, &pod_name, wait.pod_retries, wait.sleep()).await?;

    Ok(Tunnel::new(
        client.options(),
        ResourceType::Service,
        service_name,
        0,
        remote_port,
    ))
}
