//! chartcheck 공통 크레이트
//!
//! 모든 시나리오 크레이트가 공유하는 설정, 에러, 재시도 루프, 외부 명령 실행을 제공합니다.

pub mod config;
pub mod error;
pub mod random;
pub mod retry;
pub mod shell;

// --- 주요 타입 re-export ---

// 에러
pub use error::{CommandError, ConfigError, HarnessError, RetryError};

// 설정
pub use config::HarnessConfig;

// 재시도
pub use retry::{Attempt, do_with_retry};

// 외부 명령
pub use shell::{CommandOutput, ShellCommand};
