//! `anchore-cli` driver
//!
//! Exercises the deployed API through `anchore-cli --json` subcommands and
//! records each check in a [`Ledger`]. Process execution sits behind the
//! [`CliRunner`] trait so suites run against a scripted runner in tests.
//!
//! # Architecture
//!
//! ```text
//! Driver ──▶ account / image / system suites
//!    │
//!    ▼
//! CliRunner (trait)
//!    │            │
//!    ▼            ▼
//! AnchoreCli   scripted mock
//!    │
//!    ▼
//! [exec_prefix...] anchore-cli --json --u U --p P --url URL ...
//! ```

pub mod account;
pub mod image;
pub mod ledger;
pub mod system;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use chartcheck_core::config::{CliConfig, DriverConfig};
use chartcheck_core::random::unique_id;
use chartcheck_core::shell::run_command_unchecked;
use chartcheck_core::ShellCommand;
use serde_json::Value;
use tracing::{debug, info};

use crate::EngineError;

pub use ledger::{Ledger, LedgerSummary, TestKind};

const ANCHORE_CLI: &str = "anchore-cli";

/// Credentials and API URL one `anchore-cli` call runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliContext {
    pub user: String,
    pub password: String,
    pub api_url: String,
}

impl CliContext {
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            api_url: api_url.into(),
        }
    }

    /// Admin context from the `[cli]` config section.
    pub fn from_config(cli: &CliConfig, api_url: impl Into<String>) -> Self {
        Self::new(cli.user.clone(), cli.password.clone(), api_url)
    }

    /// Same API, different credentials.
    pub fn as_user(&self, user: &str, password: &str) -> Self {
        Self::new(user, password, self.api_url.clone())
    }
}

/// `--json --u USER --p PASS --url URL ARGS...`
pub fn assemble_args(context: &CliContext, args: &[&str]) -> Vec<String> {
    let mut assembled = vec![
        "--json".to_owned(),
        "--u".to_owned(),
        context.user.clone(),
        "--p".to_owned(),
        context.password.clone(),
        "--url".to_owned(),
        context.api_url.clone(),
    ];
    assembled.extend(args.iter().map(|a| (*a).to_owned()));
    assembled
}

/// Exit status and stdout of one `anchore-cli` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOutput {
    pub success: bool,
    pub stdout: String,
}

impl CliOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
        }
    }

    pub fn failed(stdout: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: stdout.into(),
        }
    }
}

/// Runs `anchore-cli` with fully assembled arguments.
pub trait CliRunner: Send + Sync {
    /// Returns `Err` only when the process could not run at all.
    fn run(&self, args: Vec<String>) -> impl Future<Output = Result<CliOutput, EngineError>> + Send;
}

/// Runs the real `anchore-cli`, optionally through a wrapper such as
/// `kubectl exec anchore-cli --`.
#[derive(Debug, Clone, Default)]
pub struct AnchoreCli {
    exec_prefix: Vec<String>,
}

impl AnchoreCli {
    pub fn new(exec_prefix: Vec<String>) -> Self {
        Self { exec_prefix }
    }

    pub fn command(&self, args: Vec<String>) -> ShellCommand {
        match self.exec_prefix.split_first() {
            Some((program, rest)) => ShellCommand::new(program.clone())
                .args(rest.iter().cloned())
                .arg(ANCHORE_CLI)
                .args(args),
            None => ShellCommand::new(ANCHORE_CLI).args(args),
        }
    }
}

impl CliRunner for AnchoreCli {
    async fn run(&self, args: Vec<String>) -> Result<CliOutput, EngineError> {
        let output = run_command_unchecked(&self.command(args)).await?;
        Ok(CliOutput {
            success: output.success,
            stdout: output.stdout,
        })
    }
}

/// Why a call produced no usable response.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CallError {
    /// Non-zero exit with a JSON error body.
    Rejected(Value),
    /// Could not run, or produced output that is not JSON.
    Failed(String),
}

impl CallError {
    /// `message` of a rejection body.
    pub(crate) fn message(&self) -> Option<&str> {
        match self {
            Self::Rejected(body) => body.get("message").and_then(Value::as_str),
            Self::Failed(_) => None,
        }
    }

    /// The API refused the caller's credentials or permissions.
    pub(crate) fn is_unauthorized(&self) -> bool {
        match self {
            Self::Rejected(body) => {
                body.as_str() == Some("Unauthorized")
                    || body.get("httpcode").and_then(Value::as_u64) == Some(403)
            }
            Self::Failed(_) => false,
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(body) => write!(f, "rejected: {body}"),
            Self::Failed(reason) => f.write_str(reason),
        }
    }
}

/// Generated account, user and credentials for a check.
#[derive(Debug, Clone)]
pub struct FakeAccount {
    pub name: String,
    pub user: String,
    pub email: String,
    pub password: String,
}

impl FakeAccount {
    pub fn generate() -> Self {
        let id = unique_id();
        Self {
            name: format!("acct{id}"),
            user: format!("user{id}"),
            email: format!("user{id}@example.com"),
            password: format!("pw{}", uuid::Uuid::new_v4().simple()),
        }
    }
}

/// Which suites to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suite {
    All,
    Account,
    Image,
    System,
}

impl Suite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Account => "account",
            Self::Image => "image",
            Self::System => "system",
        }
    }
}

impl FromStr for Suite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "account" => Ok(Self::Account),
            "image" => Ok(Self::Image),
            "system" => Ok(Self::System),
            other => Err(format!("unknown suite '{other}'")),
        }
    }
}

/// Runs suites against one API and keeps the ledger.
pub struct Driver<R: CliRunner> {
    runner: R,
    root: CliContext,
    config: DriverConfig,
    ledger: Ledger,
}

impl<R: CliRunner> Driver<R> {
    pub fn new(runner: R, root: CliContext, config: DriverConfig) -> Self {
        Self {
            runner,
            root,
            config,
            ledger: Ledger::new(),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_ledger(self) -> Ledger {
        self.ledger
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run `suite` (every suite for [`Suite::All`]) and log the summary.
    pub async fn run(&mut self, suite: Suite) -> LedgerSummary {
        info!(suite = suite.as_str(), api_url = %self.root.api_url, "driver starting");
        match suite {
            Suite::All => {
                self.account_suite().await;
                self.image_suite().await;
                self.system_suite().await;
            }
            Suite::Account => self.account_suite().await,
            Suite::Image => self.image_suite().await,
            Suite::System => self.system_suite().await,
        }
        self.ledger.log_summary();
        self.ledger.summary()
    }

    /// Run one subcommand and decode its JSON response.
    pub(crate) async fn call(&self, context: &CliContext, args: &[&str]) -> Result<Value, CallError> {
        debug!(user = %context.user, "anchore-cli {}", args.join(" "));
        let output = self
            .runner
            .run(assemble_args(context, args))
            .await
            .map_err(|e| CallError::Failed(e.to_string()))?;

        let body = output.stdout.trim();
        let parsed = if body.is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str::<Value>(body)
        };

        match (output.success, parsed) {
            (true, Ok(value)) => Ok(value),
            (true, Err(e)) => Err(CallError::Failed(format!("invalid JSON response: {e}"))),
            (false, Ok(value)) if !value.is_null() => Err(CallError::Rejected(value)),
            (false, _) => Err(CallError::Failed(format!(
                "anchore-cli {} failed: {body}",
                args.first().copied().unwrap_or_default()
            ))),
        }
    }

    /// A random configured test image.
    pub(crate) fn pick_image(&self) -> Option<String> {
        let images = &self.config.test_images;
        if images.is_empty() {
            return None;
        }
        let index = (uuid::Uuid::new_v4().as_u128() % images.len() as u128) as usize;
        images.get(index).cloned()
    }

    pub(crate) fn root(&self) -> CliContext {
        self.root.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> CliContext {
        CliContext::new("admin", "foobar", "http://127.0.0.1:8228/v1")
    }

    #[test]
    fn args_carry_credentials_and_url() {
        let args = assemble_args(&context(), &["account", "get", "acct1"]);
        assert_eq!(
            args,
            vec![
                "--json",
                "--u",
                "admin",
                "--p",
                "foobar",
                "--url",
                "http://127.0.0.1:8228/v1",
                "account",
                "get",
                "acct1"
            ]
        );
    }

    #[test]
    fn as_user_keeps_api_url() {
        let user = context().as_user("user1", "pw");
        assert_eq!(user.user, "user1");
        assert_eq!(user.api_url, "http://127.0.0.1:8228/v1");
    }

    #[test]
    fn exec_prefix_wraps_cli() {
        let cli = AnchoreCli::new(vec![
            "kubectl".to_owned(),
            "exec".to_owned(),
            "anchore-cli".to_owned(),
            "--".to_owned(),
        ]);
        let cmd = cli.command(vec!["--json".to_owned(), "system".to_owned(), "status".to_owned()]);
        assert_eq!(cmd.command, "kubectl");
        assert_eq!(
            cmd.args,
            vec!["exec", "anchore-cli", "--", "anchore-cli", "--json", "system", "status"]
        );

        let bare = AnchoreCli::default().command(vec!["--json".to_owned()]);
        assert_eq!(bare.command, "anchore-cli");
    }

    #[test]
    fn fake_accounts_are_unique() {
        let a = FakeAccount::generate();
        let b = FakeAccount::generate();
        assert_ne!(a.name, b.name);
        assert!(a.email.ends_with("@example.com"));
        assert!(a.name.starts_with("acct"));
    }

    #[test]
    fn call_error_classification() {
        let unauthorized = CallError::Rejected(Value::from("Unauthorized"));
        assert!(unauthorized.is_unauthorized());

        let forbidden = CallError::Rejected(serde_json::json!({"httpcode": 403, "message": "nope"}));
        assert!(forbidden.is_unauthorized());
        assert_eq!(forbidden.message(), Some("nope"));

        let failed = CallError::Failed("spawn".to_owned());
        assert!(!failed.is_unauthorized());
        assert_eq!(failed.message(), None);
    }

    #[test]
    fn suite_names() {
        for suite in [Suite::All, Suite::Account, Suite::Image, Suite::System] {
            assert_eq!(suite.as_str().parse::<Suite>().unwrap(), suite);
        }
        assert!("policy".parse::<Suite>().is_err());
    }

    #[tokio::test]
    async fn call_decodes_success_and_rejection() {
        let runner = mock::ScriptedCli::new(|_user, args| match args[0].as_str() {
            "ok" => CliOutput::ok(r#"{"state": "enabled"}"#),
            "empty" => CliOutput::ok(""),
            "rejected" => CliOutput::failed(r#"{"message": "no"}"#),
            "garbage" => CliOutput::ok("not json"),
            _ => CliOutput::failed("Error: boom"),
        });
        let driver = Driver::new(runner, context(), DriverConfig::default());
        let ctx = driver.root();

        assert_eq!(driver.call(&ctx, &["ok"]).await.unwrap()["state"], "enabled");
        assert_eq!(driver.call(&ctx, &["empty"]).await.unwrap(), Value::Null);
        assert!(matches!(
            driver.call(&ctx, &["rejected"]).await,
            Err(CallError::Rejected(_))
        ));
        assert!(matches!(
            driver.call(&ctx, &["garbage"]).await,
            Err(CallError::Failed(_))
        ));
        assert!(matches!(
            driver.call(&ctx, &["other"]).await,
            Err(CallError::Failed(_))
        ));
        assert_eq!(driver.runner().calls().len(), 5);
    }

    #[test]
    fn pick_image_uses_configured_images() {
        let runner = mock::ScriptedCli::new(|_, _| CliOutput::ok(""));
        let config = DriverConfig {
            test_images: vec!["docker.io/alpine:latest".to_owned()],
            ..DriverConfig::default()
        };
        let driver = Driver::new(runner, context(), config);
        assert_eq!(driver.pick_image().as_deref(), Some("docker.io/alpine:latest"));

        let empty = Driver::new(
            mock::ScriptedCli::new(|_, _| CliOutput::ok("")),
            context(),
            DriverConfig {
                test_images: Vec::new(),
                ..DriverConfig::default()
            },
        );
        assert!(empty.pick_image().is_none());
    }
}
