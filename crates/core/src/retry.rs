//! 재시도 루프 — 고정 간격 폴링
//!
//! 클러스터 상태를 기다리는 모든 작업(서비스 준비, 파드 준비, HTTP 프로브,
//! `anchore-cli system status`)은 [`do_with_retry`]를 통해 실행됩니다.
//!
//! 액션은 매 시도마다 [`Attempt`]를 반환합니다:
//! - `Ok(T)`: 성공, 즉시 반환
//! - `Err(Attempt::Retry(..))`: 로그 후 `sleep` 만큼 대기하고 재시도
//! - `Err(Attempt::Fatal(..))`: 재시도 없이 즉시 중단

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::RetryError;

/// 한 번의 시도가 실패한 이유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// 재시도 가능한 실패
    Retry(String),
    /// 재시도해도 의미 없는 실패
    Fatal(String),
}

impl Attempt {
    /// 재시도 가능한 실패를 생성합니다.
    pub fn retry(reason: impl Display) -> Self {
        Self::Retry(reason.to_string())
    }

    /// 치명적인 실패를 생성합니다.
    pub fn fatal(reason: impl Display) -> Self {
        Self::Fatal(reason.to_string())
    }
}

impl Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retry(reason) | Self::Fatal(reason) => f.write_str(reason),
        }
    }
}

/// `action`을 최대 `max_retries + 1`번 실행합니다.
///
/// 실패한 시도 사이에 `sleep`만큼 대기하며, 마지막 시도 후에는 대기하지 않습니다.
pub async fn do_with_retry<T, F, Fut>(
    description: &str,
    max_retries: u32,
    sleep: Duration,
    mut action: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Attempt>>,
{
    let mut last_error = String::new();

    for attempt in 0..=max_retries {
        info!(description, attempt, "running");
        match action().await {
            Ok(value) => return Ok(value),
            Err(Attempt::Fatal(reason)) => {
                return Err(RetryError::Fatal {
                    description: description.to_owned(),
                    reason,
                });
            }
            Err(Attempt::Retry(reason)) => {
                if attempt < max_retries {
                    warn!(
                        description,
                        attempt,
                        error = %reason,
                        sleep_secs = sleep.as_secs_f64(),
                        "attempt failed, sleeping before retry"
                    );
                    tokio::time::sleep(sleep).await;
                }
                last_error = reason;
            }
        }
    }

    Err(RetryError::MaxRetriesExceeded {
        description: description.to_owned(),
        max_retries,
        sleep,
        last_error,
    })
}
