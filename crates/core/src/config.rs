//! 설정 관리: testgrid.toml 파싱 및 런타임 설정
//!
//! [`TestGridConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`TESTGRID_SERVER_PORT=9090` 형식)
//! 3. 설정 파일 (`testgrid.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), testgrid_core::error::TestGridError> {
//! use testgrid_core::config::TestGridConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = TestGridConfig::load("testgrid.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = TestGridConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, TestGridError};
use crate::types::TestEngine;

/// TestGrid 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestGridConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// 오케스트레이션 설정
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    /// 조회 API 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 테스트 엔진 어댑터 설정
    #[serde(default)]
    pub engines: EnginesConfig,
}

impl TestGridConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TestGridError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값을 사용하여 로드합니다.
    ///
    /// CLI처럼 설정 파일이 선택 사항인 경우에 사용합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, TestGridError> {
        match Self::load(path.as_ref()).await {
            Err(TestGridError::Config(ConfigError::FileNotFound { path })) => {
                tracing::debug!(path, "config file not found, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TestGridError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TestGridError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TestGridError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TestGridError> {
        toml::from_str(toml_str).map_err(|e| {
            TestGridError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `TESTGRID_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "TESTGRID_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TESTGRID_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "TESTGRID_GENERAL_DATA_DIR");
        override_string(&mut self.general.pid_file, "TESTGRID_GENERAL_PID_FILE");

        // Storage
        override_string(&mut self.storage.backend, "TESTGRID_STORAGE_BACKEND");
        override_string(&mut self.storage.file_name, "TESTGRID_STORAGE_FILE_NAME");

        // Coordinator
        override_usize(
            &mut self.coordinator.max_concurrent_scenarios,
            "TESTGRID_COORDINATOR_MAX_CONCURRENT_SCENARIOS",
        );
        override_usize(
            &mut self.coordinator.event_channel_capacity,
            "TESTGRID_COORDINATOR_EVENT_CHANNEL_CAPACITY",
        );
        override_u64(
            &mut self.coordinator.cancel_grace_secs,
            "TESTGRID_COORDINATOR_CANCEL_GRACE_SECS",
        );

        // Server
        override_string(&mut self.server.listen_addr, "TESTGRID_SERVER_LISTEN_ADDR");
        override_u16(&mut self.server.port, "TESTGRID_SERVER_PORT");

        // Metrics
        override_bool(&mut self.metrics.enabled, "TESTGRID_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "TESTGRID_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "TESTGRID_METRICS_PORT");

        // Engines
        override_string(&mut self.engines.jmeter.command, "TESTGRID_ENGINES_JMETER_COMMAND");
        override_string(&mut self.engines.testng.command, "TESTGRID_ENGINES_TESTNG_COMMAND");
        override_string(
            &mut self.engines.selenium.command,
            "TESTGRID_ENGINES_SELENIUM_COMMAND",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TestGridError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        let valid_backends = ["memory", "file"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(invalid(
                "storage.backend",
                format!("must be one of: {}", valid_backends.join(", ")),
            ));
        }

        if self.storage.backend == "file" && self.storage.file_name.is_empty() {
            return Err(invalid(
                "storage.file_name",
                "file name must not be empty when backend is 'file'".to_owned(),
            ));
        }

        if self.coordinator.max_concurrent_scenarios == 0 {
            return Err(invalid(
                "coordinator.max_concurrent_scenarios",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.coordinator.event_channel_capacity == 0 {
            return Err(invalid(
                "coordinator.event_channel_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.server.port == 0 {
            return Err(invalid("server.port", "must be greater than 0".to_owned()));
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(invalid("metrics.port", "must be greater than 0".to_owned()));
            }
            if self.metrics.endpoint != "/metrics" {
                return Err(invalid(
                    "metrics.endpoint",
                    "only '/metrics' is supported".to_owned(),
                ));
            }
        }

        for engine in TestEngine::ALL {
            if self.engines.get(engine).timeout_secs == 0 {
                return Err(invalid(
                    &format!("engines.{}.timeout_secs", engine.config_key()),
                    "must be greater than 0".to_owned(),
                ));
            }
        }

        Ok(())
    }

    /// `file` 백엔드의 스냅샷 파일 경로
    pub fn storage_path(&self) -> PathBuf {
        Path::new(&self.general.data_dir).join(&self.storage.file_name)
    }
}

fn invalid(field: &str, reason: String) -> TestGridError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
    /// PID 파일 경로 (빈 문자열이면 사용하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/testgrid".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 저장 백엔드 (memory, file)
    pub backend: String,
    /// `data_dir` 아래 스냅샷 파일명
    pub file_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "file".to_owned(),
            file_name: "testgrid.json".to_owned(),
        }
    }
}

/// 오케스트레이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// 동시에 엔진을 점유할 수 있는 시나리오 수
    pub max_concurrent_scenarios: usize,
    /// 상태 이벤트 브로드캐스트 채널 용량
    pub event_channel_capacity: usize,
    /// 취소 요청 후 엔진 응답을 기다리는 시간 (초)
    pub cancel_grace_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scenarios: 8,
            event_channel_capacity: 256,
            cancel_grace_secs: 30,
        }
    }
}

/// 조회 API 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_owned(),
            port: 8080,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

/// 엔진별 어댑터 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnginesConfig {
    pub jmeter: EngineConfig,
    pub testng: EngineConfig,
    pub selenium: EngineConfig,
}

impl EnginesConfig {
    pub fn get(&self, engine: TestEngine) -> &EngineConfig {
        match engine {
            TestEngine::Jmeter => &self.jmeter,
            TestEngine::Testng => &self.testng,
            TestEngine::Selenium => &self.selenium,
        }
    }
}

/// 외부 프로세스 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 실행 명령 (빈 문자열이면 엔진 미설치)
    pub command: String,
    /// 명령 인자
    pub args: Vec<String>,
    /// 시나리오 하나의 최대 실행 시간 (초)
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            timeout_secs: 3600,
        }
    }
}

impl EngineConfig {
    /// 명령이 설정되었는지 확인합니다.
    pub fn is_configured(&self) -> bool {
        !self.command.trim().is_empty()
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
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

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
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
