//! Up/down management of cluster resources.
//!
//! A [`Manager`] owns a [`CommandBuilder`] that knows how to create and
//! delete one resource. Once `up` has run, dropping the manager tears the
//! resource down unless `down` already ran or the manager was told to
//! [`persist`](Manager::persist).

use chartcheck_core::ShellCommand;
use chartcheck_core::shell::{run_command, run_command_blocking};
use tracing::{error, info};

use crate::error::K8sError;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CommandToBuild {
    Up,
    Down,
}

pub trait CommandBuilder {
    fn build(&self, command_to_build: CommandToBuild) -> ShellCommand;

    /// Human readable resource name for logs.
    fn describe(&self) -> String;
}

/// Manages commands for bringing up and shutting down resources on the cluster.
#[derive(Debug)]
pub struct Manager<B>
where
    B: CommandBuilder,
{
    command_builder: B,
    needs_drop: bool,
}

impl<B> Manager<B>
where
    B: CommandBuilder,
{
    /// Create a new Manager.
    pub fn new(command_builder: B) -> Self {
        Self {
            command_builder,
            needs_drop: false,
        }
    }

    /// Bring up the resource.
    pub async fn up(&mut self) -> Result<(), K8sError> {
        self.needs_drop = true;
        self.exec(CommandToBuild::Up).await
    }

    /// Shut down the resource.
    pub async fn down(&mut self) -> Result<(), K8sError> {
        self.needs_drop = false;
        self.exec(CommandToBuild::Down).await
    }

    /// Shut down the resource, blocking execution.
    pub fn down_blocking(&mut self) -> Result<(), K8sError> {
        self.needs_drop = false;
        let command = self.command_builder.build(CommandToBuild::Down);
        run_command_blocking(&command)?;
        Ok(())
    }

    /// Leave the resource in place when the manager is dropped.
    pub fn persist(&mut self) {
        if self.needs_drop {
            info!(resource = %self.command_builder.describe(), "keeping resource after test");
        }
        self.needs_drop = false;
    }

    /// Whether dropping the manager would tear the resource down.
    pub fn needs_drop(&self) -> bool {
        self.needs_drop
    }

    pub fn builder(&self) -> &B {
        &self.command_builder
    }

    async fn exec(&self, command_to_build: CommandToBuild) -> Result<(), K8sError> {
        let command = self.command_builder.build(command_to_build);
        run_command(&command).await?;
        Ok(())
    }
}

impl<B> Drop for Manager<B>
where
    B: CommandBuilder,
{
    fn drop(&mut self) {
        if self.needs_drop {
            let resource = self.command_builder.describe();
            if let Err(e) = self.down_blocking() {
                error!(resource = %resource, error = %e, "teardown failed");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;

    use super::*;

    /// Creates a marker file on up and removes it on down.
    struct MarkerBuilder {
        path: PathBuf,
    }

    impl CommandBuilder for MarkerBuilder {
        fn build(&self, command_to_build: CommandToBuild) -> ShellCommand {
            let verb = match command_to_build {
                CommandToBuild::Up => "touch",
                CommandToBuild::Down => "rm",
            };
            ShellCommand::new(verb).arg(self.path.to_string_lossy())
        }

        fn describe(&self) -> String {
            format!("marker {}", self.path.display())
        }
    }

    #[tokio::test]
    async fn up_then_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("up");
        let mut manager = Manager::new(MarkerBuilder { path: path.clone() });

        assert!(!manager.needs_drop());
        manager.up().await.unwrap();
        assert!(path.exists());
        assert!(manager.needs_drop());

        manager.down().await.unwrap();
        assert!(!path.exists());
        assert!(!manager.needs_drop());
    }

    #[tokio::test]
    async fn drop_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped");
        {
            let mut manager = Manager::new(MarkerBuilder { path: path.clone() });
            manager.up().await.unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn persist_skips_teardown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kept");
        {
            let mut manager = Manager::new(MarkerBuilder { path: path.clone() });
            manager.up().await.unwrap();
            manager.persist();
        }
        assert!(path.exists());
    }

    #[test]
    fn failed_teardown_in_drop_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = Manager::new(MarkerBuilder {
            path: dir.path().join("never-created"),
        });
        // skip up, arm the drop path directly
        manager.needs_drop = true;
        drop(manager);
    }
}
