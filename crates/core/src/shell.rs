//! 외부 명령 실행 — kubectl, helm, anchore-cli, tox
//!
//! [`ShellCommand`]는 실행할 바이너리, 인자, 추가 환경변수, 작업 디렉토리를 담습니다.
//! 모든 출력 라인은 `tracing`으로 기록되며, 시크릿을 다루는 명령은
//! [`ShellCommand::quiet`]로 출력 로깅을 끌 수 있습니다.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::error::CommandError;

/// 실행할 외부 명령
#[derive(Debug, Clone, Default)]
pub struct ShellCommand {
    /// 실행 파일 이름 또는 경로
    pub command: String,
    /// 인자 목록
    pub args: Vec<String>,
    /// 추가 환경변수 (현재 프로세스 환경에 덧붙여짐)
    pub env: BTreeMap<String, String>,
    /// 작업 디렉토리
    pub working_dir: Option<PathBuf>,
    /// false면 출력 라인을 로그에 남기지 않음
    pub log_output: bool,
}

impl ShellCommand {
    /// 인자 없는 명령을 생성합니다.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            log_output: true,
            ..Self::default()
        }
    }

    /// 인자 하나를 추가합니다.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// 인자 여러 개를 추가합니다.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// 환경변수 하나를 설정합니다.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// 환경변수 여러 개를 설정합니다.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// 작업 디렉토리를 설정합니다.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// 출력 로깅을 끕니다.
    pub fn quiet(mut self) -> Self {
        self.log_output = false;
        self
    }

    /// 로그/에러 메시지용 명령 문자열
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }

    fn to_tokio(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.command);
        command.args(&self.args).envs(&self.env);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }

    fn to_std(&self) -> std::process::Command {
        let mut command = std::process::Command::new(&self.command);
        command.args(&self.args).envs(&self.env);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

/// 명령 실행 결과
#[derive(Debug, Default)]
struct Captured {
    stdout: Vec<String>,
    /// stdout/stderr 라인을 도착 순서대로 합친 출력
    combined: Vec<String>,
}

/// 종료 코드를 검사하지 않은 실행 결과
///
/// `anchore-cli --json`처럼 실패 시에도 stdout에 의미 있는 응답을 쓰는 명령에 사용합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// 종료 코드 0 여부
    pub success: bool,
    /// 종료 코드 (시그널로 종료되면 None)
    pub code: Option<i32>,
    /// stdout만
    pub stdout: String,
    /// stdout + stderr
    pub combined: String,
}

async fn execute(cmd: &ShellCommand) -> Result<Captured, CommandError> {
    let (captured, status) = execute_unchecked(cmd).await?;
    if !status.success() {
        return Err(CommandError::Failed {
            command: cmd.display(),
            status: status.to_string(),
            output: captured.combined.join("\n"),
        });
    }
    Ok(captured)
}

async fn execute_unchecked(
    cmd: &ShellCommand,
) -> Result<(Captured, std::process::ExitStatus), CommandError> {
    let shown = cmd.display();
    info!(command = %shown, "running command");

    let mut child = cmd
        .to_tokio()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CommandError::Spawn {
            command: shown.clone(),
            reason: e.to_string(),
        })?;

    let io_err = |e: std::io::Error| CommandError::InvalidOutput {
        command: shown.clone(),
        reason: e.to_string(),
    };

    let stdout = child.stdout.take().ok_or_else(|| CommandError::Spawn {
        command: shown.clone(),
        reason: "stdout not captured".to_owned(),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| CommandError::Spawn {
        command: shown.clone(),
        reason: "stderr not captured".to_owned(),
    })?;

    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();
    let mut stdout_done = false;
    let mut stderr_done = false;
    let mut captured = Captured::default();

    while !(stdout_done && stderr_done) {
        tokio::select! {
            line = stdout_lines.next_line(), if !stdout_done => match line.map_err(io_err)? {
                Some(line) => {
                    if cmd.log_output {
                        debug!(command = %cmd.command, "{line}");
                    }
                    captured.stdout.push(line.clone());
                    captured.combined.push(line);
                }
                None => stdout_done = true,
            },
            line = stderr_lines.next_line(), if !stderr_done => match line.map_err(io_err)? {
                Some(line) => {
                    if cmd.log_output {
                        debug!(command = %cmd.command, stream = "stderr", "{line}");
                    }
                    captured.combined.push(line);
                }
                None => stderr_done = true,
            },
        }
    }

    let status = child.wait().await.map_err(io_err)?;
    Ok((captured, status))
}

/// 명령을 실행하고 stdout+stderr 합친 출력을 반환합니다.
///
/// 0이 아닌 종료 코드는 [`CommandError::Failed`]로 반환되며 출력이 포함됩니다.
pub async fn run_command_and_get_output(cmd: &ShellCommand) -> Result<String, CommandError> {
    execute(cmd).await.map(|c| c.combined.join("\n"))
}

/// 명령을 실행하고 stdout만 반환합니다 (JSON/YAML 출력 파싱용).
pub async fn run_command_and_get_stdout(cmd: &ShellCommand) -> Result<String, CommandError> {
    execute(cmd).await.map(|c| c.stdout.join("\n"))
}

/// 명령을 실행하고 성공 여부만 확인합니다.
pub async fn run_command(cmd: &ShellCommand) -> Result<(), CommandError> {
    execute(cmd).await.map(|_| ())
}

/// 명령을 실행하고 종료 코드와 관계없이 출력을 반환합니다.
///
/// 프로세스를 시작하지 못한 경우에만 에러를 반환합니다.
pub async fn run_command_unchecked(cmd: &ShellCommand) -> Result<CommandOutput, CommandError> {
    let (captured, status) = execute_unchecked(cmd).await?;
    Ok(CommandOutput {
        success: status.success(),
        code: status.code(),
        stdout: captured.stdout.join("\n"),
        combined: captured.combined.join("\n"),
    })
}

/// 장기 실행 프로세스를 시작합니다 (예: `kubectl port-forward`).
///
/// stdout/stderr는 파이프로 연결되며, 반환된 `Child`가 drop되면 프로세스도 종료됩니다.
pub fn spawn(cmd: &ShellCommand) -> Result<tokio::process::Child, CommandError> {
    let shown = cmd.display();
    info!(command = %shown, "spawning background command");
    cmd.to_tokio()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CommandError::Spawn {
            command: shown,
            reason: e.to_string(),
        })
}

/// 블로킹 실행 — `Drop`에서 리소스를 정리할 때 사용합니다.
pub fn run_command_blocking(cmd: &ShellCommand) -> Result<String, CommandError> {
    let shown = cmd.display();
    info!(command = %shown, "running command (blocking)");

    let output = cmd
        .to_std()
        .stdin(Stdio::null())
        .output()
        .map_err(|e| CommandError::Spawn {
            command: shown.clone(),
            reason: e.to_string(),
        })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let combined = combined.trim_end().to_owned();
    if cmd.log_output {
        for line in combined.lines() {
            debug!(command = %cmd.command, "{line}");
        }
    }

    if !output.status.success() {
        return Err(CommandError::Failed {
            command: shown,
            status: output.status.to_string(),
            output: combined,
        });
    }
    Ok(combined)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn display_joins_args() {
        let cmd = ShellCommand::new("helm").args(["install", "rel", "chart"]);
        assert_eq!(cmd.display(), "helm install rel chart");
        assert_eq!(ShellCommand::new("tox").display(), "tox");
    }

    #[test]
    fn builder_collects_env() {
        let cmd = ShellCommand::new("anchore-cli")
            .env("ANCHORE_CLI_USER", "admin")
            .envs([("ANCHORE_CLI_PASS", "foobar")]);
        assert_eq!(cmd.env.len(), 2);
        assert!(cmd.log_output);
        assert!(!cmd.quiet().log_output);
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let cmd = ShellCommand::new("sh")
            .arg("-c")
            .arg("echo out; echo err 1>&2");
        let output = run_command_and_get_output(&cmd).await.unwrap();
        assert!(output.contains("out"));
        assert!(output.contains("err"));

        let stdout = run_command_and_get_stdout(&cmd).await.unwrap();
        assert_eq!(stdout, "out");
    }

    #[tokio::test]
    async fn passes_environment() {
        let cmd = ShellCommand::new("sh")
            .arg("-c")
            .arg("echo $ANCHORE_CLI_URL")
            .env("ANCHORE_CLI_URL", "http://127.0.0.1:8228/v1");
        let output = run_command_and_get_output(&cmd).await.unwrap();
        assert_eq!(output, "http://127.0.0.1:8228/v1");
    }

    #[tokio::test]
    async fn non_zero_exit_keeps_output() {
        let cmd = ShellCommand::new("sh").arg("-c").arg("echo boom; exit 3");
        let err = run_command_and_get_output(&cmd).await.unwrap_err();
        match err {
            CommandError::Failed { output, .. } => assert_eq!(output, "boom"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unchecked_run_keeps_failed_stdout() {
        let cmd = ShellCommand::new("sh")
            .arg("-c")
            .arg("echo '{\"httpcode\": 403}'; echo warn 1>&2; exit 1");
        let output = run_command_unchecked(&cmd).await.unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(1));
        assert_eq!(output.stdout, "{\"httpcode\": 403}");
        assert!(output.combined.contains("warn"));
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let cmd = ShellCommand::new("chartcheck-definitely-not-installed");
        let err = run_command(&cmd).await.unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[tokio::test]
    async fn errors_carry_the_full_command_line() {
        let cmd = ShellCommand::new("chartcheck-definitely-not-installed").args(["a", "b"]);
        match run_command(&cmd).await.unwrap_err() {
            CommandError::Spawn { command, .. } => {
                assert_eq!(command, "chartcheck-definitely-not-installed a b")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        match spawn(&cmd).unwrap_err() {
            CommandError::Spawn { command, .. } => {
                assert_eq!(command, "chartcheck-definitely-not-installed a b")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        match run_command_blocking(&cmd).unwrap_err() {
            CommandError::Spawn { command, .. } => {
                assert_eq!(command, "chartcheck-definitely-not-installed a b")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn working_dir_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = ShellCommand::new("pwd").working_dir(dir.path());
        let output = run_command_and_get_output(&cmd).await.unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(
            std::path::Path::new(&output).canonicalize().unwrap(),
            expected
        );
    }

    #[test]
    fn blocking_run_reports_failure() {
        let ok = ShellCommand::new("sh").arg("-c").arg("echo fine");
        assert_eq!(run_command_blocking(&ok).unwrap(), "fine");

        let bad = ShellCommand::new("sh").arg("-c").arg("exit 1");
        assert!(matches!(
            run_command_blocking(&bad).unwrap_err(),
            CommandError::Failed { .. }
        ));
    }
}
