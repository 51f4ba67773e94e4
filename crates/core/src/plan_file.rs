//! 테스트 플랜 정의 파일: `testgrid plan create --file`이 읽는 TOML 문서
//!
//! ```toml
//! [[scenario]]
//! name = "login-flow"
//! test_engine = "selenium"
//!
//! [[scenario]]
//! name = "soak"
//! test_engine = "JMETER"
//! enabled = false
//! ```
//!
//! 엔진 이름은 대소문자를 구분하지 않습니다.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, TestGridError, ValidationError};
use crate::types::{ScenarioDefinition, TestEngine};

#[derive(Debug, Deserialize)]
struct RawPlanFile {
    #[serde(default, rename = "scenario")]
    scenarios: Vec<RawScenario>,
}

#[derive(Debug, Deserialize)]
struct RawScenario {
    name: String,
    #[serde(default)]
    enabled: Option<bool>,
    test_engine: String,
}

/// 파싱된 플랜 정의
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanFile {
    pub scenarios: Vec<ScenarioDefinition>,
}

impl PlanFile {
    /// TOML 문자열에서 플랜 정의를 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, TestGridError> {
        let raw: RawPlanFile = toml::from_str(toml_str).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })?;

        let scenarios = raw
            .scenarios
            .into_iter()
            .map(|s| {
                if s.name.trim().is_empty() {
                    return Err(ValidationError::EmptyField("scenario.name"));
                }
                let engine: TestEngine = s.test_engine.parse()?;
                let mut def = ScenarioDefinition::new(s.name, engine);
                def.enabled = s.enabled.unwrap_or(true);
                Ok(def)
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(Self { scenarios })
    }

    /// 파일에서 플랜 정의를 읽습니다.
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
        Self::parse(&content)
    }

    pub fn into_definitions(self) -> Vec<ScenarioDefinition> {
        self.scenarios
    }
}
