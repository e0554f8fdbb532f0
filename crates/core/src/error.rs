//! 에러 타입 — 도메인별 에러 정의

use std::time::Duration;

/// chartcheck 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 외부 명령 실행 에러
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// 재시도 루프 에러
    #[error("retry error: {0}")]
    Retry(#[from] RetryError),

    /// 클러스터 작업 에러 (kubectl / helm)
    #[error("cluster error: {0}")]
    Cluster(String),

    /// 배포된 서비스 검증 실패
    #[error("verification failed: {0}")]
    Verification(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 외부 명령 실행 에러
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// 프로세스 시작 실패 (바이너리 없음, 권한 등)
    #[error("failed to spawn '{command}': {reason}")]
    Spawn { command: String, reason: String },

    /// 0이 아닌 종료 코드
    #[error("'{command}' exited with {status}")]
    Failed {
        command: String,
        status: String,
        /// stdout + stderr 합친 출력
        output: String,
    },

    /// 출력 디코딩 실패
    #[error("invalid output from '{command}': {reason}")]
    InvalidOutput { command: String, reason: String },
}

impl CommandError {
    /// 실패한 명령의 출력을 반환합니다. 출력이 없는 변형은 빈 문자열입니다.
    pub fn output(&self) -> &str {
        match self {
            Self::Failed { output, .. } => output,
            Self::Spawn { .. } | Self::InvalidOutput { .. } => "",
        }
    }
}

/// 재시도 루프 에러
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// 최대 재시도 횟수 초과
    #[error("'{description}' unsuccessful after {max_retries} retries (sleep {sleep:?}): {last_error}")]
    MaxRetriesExceeded {
        description: String,
        max_retries: u32,
        sleep: Duration,
        last_error: String,
    },

    /// 재시도하지 않고 즉시 중단해야 하는 에러
    #[error("'{description}' aborted: {reason}")]
    Fatal { description: String, reason: String },
}
