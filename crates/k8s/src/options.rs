//! Global `kubectl` flags shared by every invocation.

use chartcheck_core::ShellCommand;
use chartcheck_core::config::ClusterConfig;

/// Context, kubeconfig and namespace applied to each `kubectl` call.
///
/// Empty fields fall back to kubectl's own defaults (current context,
/// `~/.kube/config`, `default` namespace).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KubectlOptions {
    pub context: Option<String>,
    pub config_path: Option<String>,
    pub namespace: Option<String>,
}

impl KubectlOptions {
    pub fn new(context: Option<String>, config_path: Option<String>) -> Self {
        Self {
            context,
            config_path,
            namespace: None,
        }
    }

    /// Options for the cluster section of the harness config.
    pub fn from_config(cluster: &ClusterConfig) -> Self {
        Self::new(cluster.kube_context.clone(), cluster.kubeconfig.clone())
    }

    /// Clone with the namespace set.
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..self.clone()
        }
    }

    /// Namespace to use, `default` when unset.
    pub fn namespace_or_default(&self) -> &str {
        self.namespace.as_deref().unwrap_or("default")
    }

    /// Global flags in the order kubectl documents them.
    pub fn kubectl_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(context) = &self.context {
            args.push("--context".to_owned());
            args.push(context.clone());
        }
        if let Some(path) = &self.config_path {
            args.push("--kubeconfig".to_owned());
            args.push(path.clone());
        }
        if let Some(namespace) = &self.namespace {
            args.push("--namespace".to_owned());
            args.push(namespace.clone());
        }
        args
    }

    /// `kubectl <global flags> <args>`.
    pub fn command<I, S>(&self, args: I) -> ShellCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ShellCommand::new("kubectl")
            .args(self.kubectl_args())
            .args(args)
    }
}
