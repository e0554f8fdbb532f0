//! Manage namespaces.

use chartcheck_core::ShellCommand;

use crate::lifecycle::{self, CommandToBuild, Manager};
use crate::options::KubectlOptions;

/// Parameters required to build `kubectl` commands to manage the namespace.
#[derive(Debug)]
pub struct CommandBuilder {
    options: KubectlOptions,
    namespace: String,
}

impl CommandBuilder {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl lifecycle::CommandBuilder for CommandBuilder {
    fn build(&self, command_to_build: CommandToBuild) -> ShellCommand {
        // the namespace is the subject here, not the scope of the call
        let options = KubectlOptions {
            namespace: None,
            ..self.options.clone()
        };
        match command_to_build {
            CommandToBuild::Up => options.command(["create", "namespace", self.namespace.as_str()]),
            CommandToBuild::Down => {
                options.command(["delete", "namespace", self.namespace.as_str(), "--wait=false"])
            }
        }
    }

    fn describe(&self) -> String {
        format!("namespace/{}", self.namespace)
    }
}

/// Create a new [`Manager`] for the namespace. Nothing runs until `up`.
pub fn manager(options: &KubectlOptions, namespace: &str) -> Manager<CommandBuilder> {
    Manager::new(CommandBuilder {
        options: options.clone(),
        namespace: namespace.to_owned(),
    })
}

/// Create the namespace and return the manager that deletes it on drop.
pub async fn create_namespace(
    options: &KubectlOptions,
    namespace: &str,
) -> Result<Manager<CommandBuilder>, crate::K8sError> {
    let mut manager = manager(options, namespace);
    manager.up().await?;
    Ok(manager)
}
