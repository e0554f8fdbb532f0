//! The tox functional test suite, run against a tunnelled API.

use std::collections::BTreeMap;
use std::path::Path;

use chartcheck_core::shell::run_command_unchecked;
use chartcheck_core::ShellCommand;
use tracing::{error, info};

use crate::EngineError;

/// `http://{endpoint}/v1`
pub fn api_url(endpoint: &str) -> String {
    format!("http://{endpoint}/v1")
}

/// Environment `anchore-cli` reads its connection settings from.
pub fn cli_env(api_endpoint: &str, user: &str, password: &str) -> BTreeMap<String, String> {
    cli_env_for_url(&api_url(api_endpoint), user, password)
}

/// Same as [`cli_env`] for a full API URL.
pub fn cli_env_for_url(url: &str, user: &str, password: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("ANCHORE_CLI_URL".to_owned(), url.to_owned()),
        ("ANCHORE_CLI_USER".to_owned(), user.to_owned()),
        ("ANCHORE_CLI_PASS".to_owned(), password.to_owned()),
    ])
}

/// Run `tox ARGS` with `env`, write the combined output to `log_path` and
/// print it. Fails after writing the log when tox exits non-zero.
pub async fn run_tox(
    env: &BTreeMap<String, String>,
    args: &[String],
    log_path: &Path,
) -> Result<String, EngineError> {
    let cmd = ShellCommand::new("tox")
        .args(args.iter().cloned())
        .envs(env.iter().map(|(k, v)| (k.clone(), v.clone())));
    run_suite_command(&cmd, log_path).await
}

async fn run_suite_command(cmd: &ShellCommand, log_path: &Path) -> Result<String, EngineError> {
    let output = run_command_unchecked(cmd).await?;

    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(log_path, &output.combined).await?;
    println!("{}", output.combined);

    let log_path_display = log_path.display().to_string();
    if !output.success {
        let status = output
            .code
            .map_or_else(|| "killed by signal".to_owned(), |c| format!("exit code {c}"));
        error!(command = %cmd.display(), log = %log_path_display, status = %status, "test suite failed");
        return Err(EngineError::Tox {
            status,
            log_path: log_path_display,
        });
    }

    info!(command = %cmd.display(), log = %log_path_display, "test suite passed");
    Ok(output.combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_points_cli_at_v1() {
        let env = cli_env("127.0.0.1:41235", "admin", "foobar");
        assert_eq!(env["ANCHORE_CLI_URL"], "http://127.0.0.1:41235/v1");
        assert_eq!(env["ANCHORE_CLI_USER"], "admin");
        assert_eq!(env["ANCHORE_CLI_PASS"], "foobar");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn passing_suite_writes_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("logs").join("engine_tests.log");
        let cmd = ShellCommand::new("sh")
            .arg("-c")
            .arg("echo \"url=$ANCHORE_CLI_URL\"")
            .envs(cli_env("127.0.0.1:1", "admin", "foobar"));

        let output = run_suite_command(&cmd, &log).await.unwrap();
        assert_eq!(output, "url=http://127.0.0.1:1/v1");
        assert_eq!(std::fs::read_to_string(&log).unwrap(), output);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_suite_still_writes_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("enterprise_tests.log");
        let cmd = ShellCommand::new("sh").arg("-c").arg("echo '1 failed'; exit 1");

        let err = run_suite_command(&cmd, &log).await.unwrap_err();
        match err {
            EngineError::Tox { status, log_path } => {
                assert_eq!(status, "exit code 1");
                assert!(log_path.ends_with("enterprise_tests.log"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "1 failed");
    }
}
