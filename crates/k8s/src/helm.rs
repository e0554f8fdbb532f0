//! Manage Helm releases.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chartcheck_core::ShellCommand;
use tracing::info;

use crate::K8sError;
use crate::lifecycle::{self, CommandToBuild, Manager};
use crate::options::KubectlOptions;

/// Options passed to every `helm` call for one release.
#[derive(Debug, Clone, Default)]
pub struct HelmOptions {
    /// Cluster access; the namespace is the release namespace.
    pub kubectl: KubectlOptions,
    /// `--set key=value` overrides, rendered in key order.
    pub set_values: BTreeMap<String, String>,
    /// `-f FILE` values files.
    pub values_files: Vec<PathBuf>,
    /// Extra arguments appended to `helm install`.
    pub extra_args: Vec<String>,
}

impl HelmOptions {
    pub fn new(kubectl: KubectlOptions) -> Self {
        Self {
            kubectl,
            ..Self::default()
        }
    }

    pub fn with_set_values(mut self, values: BTreeMap<String, String>) -> Self {
        self.set_values = values;
        self
    }

    /// `--namespace`, `--kube-context`, `--kubeconfig`. Helm names the context
    /// flag differently from kubectl.
    fn global_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(namespace) = &self.kubectl.namespace {
            args.push("--namespace".to_owned());
            args.push(namespace.clone());
        }
        if let Some(context) = &self.kubectl.context {
            args.push("--kube-context".to_owned());
            args.push(context.clone());
        }
        if let Some(path) = &self.kubectl.config_path {
            args.push("--kubeconfig".to_owned());
            args.push(path.clone());
        }
        args
    }
}

/// Parameters required to build `helm` commands to manage one release.
#[derive(Debug)]
pub struct CommandBuilder {
    options: HelmOptions,
    chart: String,
    release_name: String,
}

impl CommandBuilder {
    pub fn release_name(&self) -> &str {
        &self.release_name
    }
}

impl lifecycle::CommandBuilder for CommandBuilder {
    fn build(&self, command_to_build: CommandToBuild) -> ShellCommand {
        let mut command = ShellCommand::new("helm");
        match command_to_build {
            CommandToBuild::Up => {
                command = command
                    .args(["install", self.release_name.as_str(), self.chart.as_str()])
                    .args(self.options.global_args());
                for file in &self.options.values_files {
                    command = command.arg("-f").arg(file.to_string_lossy());
                }
                for (key, value) in &self.options.set_values {
                    command = command.arg("--set").arg(format!("{key}={value}"));
                }
                command.args(self.options.extra_args.iter().cloned())
            }
            CommandToBuild::Down => command
                .args(["delete", self.release_name.as_str()])
                .args(self.options.global_args()),
        }
    }

    fn describe(&self) -> String {
        format!("release/{}", self.release_name)
    }
}

/// Create a new [`Manager`] for a release of `chart`. Nothing runs until `up`.
pub fn manager(options: HelmOptions, chart: &str, release_name: &str) -> Manager<CommandBuilder> {
    Manager::new(CommandBuilder {
        options,
        chart: chart.to_owned(),
        release_name: release_name.to_owned(),
    })
}

/// `helm install` the chart and return the manager that deletes the release on drop.
pub async fn install(
    options: HelmOptions,
    chart: &str,
    release_name: &str,
) -> Result<Manager<CommandBuilder>, K8sError> {
    info!(
        chart,
        release = release_name,
        namespace = options.kubectl.namespace_or_default(),
        values = options.set_values.len(),
        "installing helm chart"
    );
    let mut manager = manager(options, chart, release_name);
    manager.up().await?;
    Ok(manager)
}
