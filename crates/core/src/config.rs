//! 설정 관리 — chartcheck.toml 파싱 및 런타임 설정
//!
//! [`HarnessConfig`]는 모든 시나리오의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`CHARTCHECK_IMAGES_ENGINE=...` 형식)
//! 3. 설정 파일 (`chartcheck.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), chartcheck_core::error::HarnessError> {
//! use chartcheck_core::config::HarnessConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = HarnessConfig::load("chartcheck.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = HarnessConfig::parse("[chart]\npath = \"./charts/anchore-engine\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConfigError, HarnessError};

/// chartcheck 통합 설정
///
/// `chartcheck.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 테스트 대상 이미지
    #[serde(default)]
    pub images: ImageConfig,
    /// Helm 차트 설정
    #[serde(default)]
    pub chart: ChartConfig,
    /// 클러스터 접속 및 시크릿 설정
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// 대기/재시도 설정
    #[serde(default)]
    pub wait: WaitConfig,
    /// anchore-cli 인증 설정
    #[serde(default)]
    pub cli: CliConfig,
    /// tox 테스트 스위트 설정
    #[serde(default)]
    pub suite: SuiteConfig,
    /// anchore-cli 드라이버 픽스처
    #[serde(default)]
    pub driver: DriverConfig,
}

impl HarnessConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일이 없으면 기본값에 환경변수 오버라이드만 적용합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let mut config = match Self::from_file(path).await {
            Ok(config) => config,
            Err(HarnessError::Config(ConfigError::FileNotFound { .. })) => {
                info!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HarnessError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                HarnessError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, HarnessError> {
        toml::from_str(toml_str).map_err(|e| {
            HarnessError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `CHARTCHECK_{SECTION}_{FIELD}`
    /// 예: `CHARTCHECK_CHART_PATH=./charts/anchore-engine`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "CHARTCHECK_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "CHARTCHECK_GENERAL_LOG_FORMAT");
        override_string(
            &mut self.general.artifacts_dir,
            "CHARTCHECK_GENERAL_ARTIFACTS_DIR",
        );

        // Images
        override_string(&mut self.images.engine, "CHARTCHECK_IMAGES_ENGINE");
        override_string(&mut self.images.enterprise, "CHARTCHECK_IMAGES_ENTERPRISE");
        override_string(&mut self.images.ui, "CHARTCHECK_IMAGES_UI");
        override_string(&mut self.images.pull_policy, "CHARTCHECK_IMAGES_PULL_POLICY");

        // Chart
        override_string(&mut self.chart.path, "CHARTCHECK_CHART_PATH");
        override_bool(&mut self.chart.persist, "CHARTCHECK_CHART_PERSIST");

        // Cluster
        override_opt_string(
            &mut self.cluster.kube_context,
            "CHARTCHECK_CLUSTER_KUBE_CONTEXT",
        );
        override_opt_string(&mut self.cluster.kubeconfig, "CHARTCHECK_CLUSTER_KUBECONFIG");
        override_string(
            &mut self.cluster.source_namespace,
            "CHARTCHECK_CLUSTER_SOURCE_NAMESPACE",
        );
        override_string(&mut self.cluster.pull_secret, "CHARTCHECK_CLUSTER_PULL_SECRET");
        override_string(
            &mut self.cluster.license_secret,
            "CHARTCHECK_CLUSTER_LICENSE_SECRET",
        );

        // Wait
        override_u32(&mut self.wait.service_retries, "CHARTCHECK_WAIT_SERVICE_RETRIES");
        override_u32(&mut self.wait.pod_retries, "CHARTCHECK_WAIT_POD_RETRIES");
        override_u64(&mut self.wait.sleep_secs, "CHARTCHECK_WAIT_SLEEP_SECS");
        override_u64(
            &mut self.wait.tunnel_timeout_secs,
            "CHARTCHECK_WAIT_TUNNEL_TIMEOUT_SECS",
        );
        override_bool(
            &mut self.wait.check_component_health,
            "CHARTCHECK_WAIT_CHECK_COMPONENT_HEALTH",
        );

        // CLI
        override_string(&mut self.cli.user, "CHARTCHECK_CLI_USER");
        override_string(&mut self.cli.password, "CHARTCHECK_CLI_PASSWORD");
        override_csv(&mut self.cli.exec_prefix, "CHARTCHECK_CLI_EXEC_PREFIX");

        // Suite
        override_bool(&mut self.suite.short, "CHARTCHECK_SUITE_SHORT");
        override_bool(
            &mut self.suite.system_status,
            "CHARTCHECK_SUITE_SYSTEM_STATUS",
        );

        // Driver
        override_csv(&mut self.driver.test_images, "CHARTCHECK_DRIVER_TEST_IMAGES");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), HarnessError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        for (field, value) in [
            ("images.engine", &self.images.engine),
            ("images.enterprise", &self.images.enterprise),
            ("images.ui", &self.images.ui),
            ("chart.path", &self.chart.path),
            ("cluster.source_namespace", &self.cluster.source_namespace),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "must not be empty".to_owned(),
                }
                .into());
            }
        }

        let valid_policies = ["Always", "IfNotPresent", "Never"];
        if !valid_policies.contains(&self.images.pull_policy.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "images.pull_policy".to_owned(),
                reason: format!("must be one of: {}", valid_policies.join(", ")),
            }
            .into());
        }

        for (field, value) in [
            ("wait.service_retries", self.wait.service_retries),
            ("wait.pod_retries", self.wait.pod_retries),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }
        }

        if self.wait.sleep_secs == 0 || self.wait.sleep_secs > MAX_SLEEP_SECS {
            return Err(ConfigError::InvalidValue {
                field: "wait.sleep_secs".to_owned(),
                reason: format!("must be 1-{MAX_SLEEP_SECS}"),
            }
            .into());
        }

        if self.wait.tunnel_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "wait.tunnel_timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 재시도 간격 상한 (초)
const MAX_SLEEP_SECS: u64 = 600;

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// tox 로그 등 산출물 디렉토리
    pub artifacts_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            artifacts_dir: ".".to_owned(),
        }
    }
}

/// 테스트 대상 컨테이너 이미지
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Anchore Engine 이미지
    pub engine: String,
    /// Anchore Enterprise 이미지
    pub enterprise: String,
    /// Enterprise UI 이미지
    pub ui: String,
    /// 이미지 pull 정책
    pub pull_policy: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            engine: "docker.io/anchore/anchore-engine:latest".to_owned(),
            enterprise: "docker.io/anchore/enterprise:latest".to_owned(),
            ui: "docker.io/anchore/enterprise-ui:latest".to_owned(),
            pull_policy: "Always".to_owned(),
        }
    }
}

/// Helm 차트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// 차트 경로 또는 저장소 차트 이름
    pub path: String,
    /// true면 테스트 후 네임스페이스와 릴리스를 남겨둠
    pub persist: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            path: "stable/anchore-engine".to_owned(),
            persist: false,
        }
    }
}

/// 클러스터 접속 및 시크릿 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// kubectl/helm 컨텍스트 (없으면 현재 컨텍스트)
    pub kube_context: Option<String>,
    /// kubeconfig 경로 (없으면 기본 경로)
    pub kubeconfig: Option<String>,
    /// 시크릿을 복사해 올 네임스페이스
    pub source_namespace: String,
    /// 이미지 pull 시크릿 이름
    pub pull_secret: String,
    /// Enterprise 라이선스 시크릿 이름
    pub license_secret: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kube_context: None,
            kubeconfig: None,
            source_namespace: "default".to_owned(),
            pull_secret: "anchore-enterprise-pullcreds".to_owned(),
            license_secret: "anchore-enterprise-license".to_owned(),
        }
    }
}

/// 대기/재시도 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// 서비스/HTTP 프로브 재시도 횟수
    pub service_retries: u32,
    /// 파드 준비 대기 재시도 횟수
    pub pod_retries: u32,
    /// 재시도 간격 (초)
    pub sleep_secs: u64,
    /// port-forward 준비 대기 시간 (초)
    pub tunnel_timeout_secs: u64,
    /// API 외 컴포넌트의 /health 엔드포인트도 검사할지 여부
    pub check_component_health: bool,
}

impl WaitConfig {
    /// 재시도 간격을 `Duration`으로 반환합니다.
    pub fn sleep(&self) -> Duration {
        Duration::from_secs(self.sleep_secs)
    }

    /// port-forward 대기 시간을 `Duration`으로 반환합니다.
    pub fn tunnel_timeout(&self) -> Duration {
        Duration::from_secs(self.tunnel_timeout_secs)
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            service_retries: 60,
            pod_retries: 30,
            sleep_secs: 10,
            tunnel_timeout_secs: 30,
            check_component_health: false,
        }
    }
}

/// anchore-cli 인증 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 관리자 계정
    pub user: String,
    /// 관리자 비밀번호
    pub password: String,
    /// anchore-cli 앞에 붙일 argv (예: `kubectl exec anchore-cli --`)
    pub exec_prefix: Vec<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            user: "admin".to_owned(),
            password: "foobar".to_owned(),
            exec_prefix: Vec::new(),
        }
    }
}

/// tox 테스트 스위트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// true면 tox 스위트를 건너뜀
    pub short: bool,
    /// anchore-cli system status 검사 여부
    pub system_status: bool,
    /// tox 인자
    pub tox_args: Vec<String>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            short: false,
            system_status: true,
            tox_args: vec!["--".to_owned(), "-s".to_owned(), ".".to_owned()],
        }
    }
}

/// anchore-cli 드라이버 픽스처
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// 분석 대상 이미지
    pub test_images: Vec<String>,
    /// `image metadata`가 반환해야 하는 타입
    pub metadata_types: Vec<String>,
    /// `image vuln`으로 조회할 타입
    pub vulnerability_types: Vec<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            test_images: [
                "docker.io/alpine:latest",
                "docker.io/amazonlinux:latest",
                "docker.io/debian:10",
                "docker.io/nginx:latest",
                "docker.io/ubuntu:latest",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            metadata_types: ["manifest", "docker_history", "dockerfile"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            vulnerability_types: ["os", "non-os", "all"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_opt_string(target: &mut Option<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = if val.is_empty() { None } else { Some(val) };
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
