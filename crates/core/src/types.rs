//! 도메인 타입: Product → TestPlan → TestScenario → TestCase 계층
//!
//! 각 엔티티는 부모를 ID로만 참조하며 소유 관계는 고정됩니다.
//! 시나리오 집합은 플랜 생성 시점에 결정되고 이후 추가되지 않습니다.
//! 테스트 케이스는 시나리오가 RUNNING에 도달한 뒤에만 기록됩니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ValidationError};
use crate::status::{PlanStatus, ScenarioStatus, aggregate_plan_status};

/// 새 엔티티 ID를 생성합니다 (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ─── Channel ─────────────────────────────────────────────────────────

/// 제품 릴리스 채널
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    /// 장기 지원
    #[default]
    Lts,
    /// 유료 지원
    Premium,
    /// 일반 릴리스
    Released,
    /// 프리뷰
    Preview,
}

impl Channel {
    /// 정의된 모든 채널
    pub const ALL: [Channel; 4] = [
        Channel::Lts,
        Channel::Premium,
        Channel::Released,
        Channel::Preview,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lts => "LTS",
            Self::Premium => "PREMIUM",
            Self::Released => "RELEASED",
            Self::Preview => "PREVIEW",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ValidationError;

    /// 대소문자를 구분하지 않습니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == upper)
            .ok_or_else(|| ValidationError::UnknownChannel(s.to_owned()))
    }
}

// ─── TestEngine ──────────────────────────────────────────────────────

/// 시나리오를 실행하는 외부 테스트 엔진 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestEngine {
    /// 부하/성능 테스트 엔진
    Jmeter,
    /// 기능 테스트 스위트 엔진
    Testng,
    /// UI 자동화 엔진
    Selenium,
}

impl TestEngine {
    pub const ALL: [TestEngine; 3] = [TestEngine::Jmeter, TestEngine::Testng, TestEngine::Selenium];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jmeter => "JMETER",
            Self::Testng => "TESTNG",
            Self::Selenium => "SELENIUM",
        }
    }

    /// 설정 섹션 키 (`[engines.jmeter]` 등)
    pub fn config_key(self) -> &'static str {
        match self {
            Self::Jmeter => "jmeter",
            Self::Testng => "testng",
            Self::Selenium => "selenium",
        }
    }
}

impl fmt::Display for TestEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestEngine {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == upper)
            .ok_or_else(|| ValidationError::UnknownTestEngine(s.to_owned()))
    }
}

// ─── Product ─────────────────────────────────────────────────────────

/// 테스트 대상 제품
///
/// (name, version, channel) 조합은 전역적으로 유일합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub version: String,
    pub channel: Channel,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// 새 제품 레코드를 만듭니다 (저장 전).
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        channel: Channel,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let version = version.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }
        if version.trim().is_empty() {
            return Err(ValidationError::EmptyField("version"));
        }
        Ok(Self {
            id: new_id(),
            name,
            version,
            channel,
            created_at: Utc::now(),
        })
    }

    /// 유일성 키
    pub fn key(&self) -> ProductKey {
        ProductKey {
            name: self.name.clone(),
            version: self.version.clone(),
            channel: self.channel,
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.name, self.version, self.channel)
    }
}

/// 제품 유일성 키 `(name, version, channel)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductKey {
    pub name: String,
    pub version: String,
    pub channel: Channel,
}

// ─── TestCase ────────────────────────────────────────────────────────

/// 개별 테스트 케이스 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestCaseResult {
    Pass,
    Fail,
    Error,
}

impl fmt::Display for TestCaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// 시나리오 실행 중 엔진이 보고한 개별 검사
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub test_scenario_id: String,
    pub name: String,
    pub result: TestCaseResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 엔진 보고에 포함된 테스트 케이스 (ID 부여 전)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseReport {
    pub name: String,
    pub result: TestCaseResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TestCaseReport {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result: TestCaseResult::Pass,
            message: None,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result: TestCaseResult::Fail,
            message: Some(message.into()),
        }
    }

    /// 소유 시나리오 아래의 [`TestCase`]로 변환합니다.
    pub fn into_case(self, scenario_id: &str) -> TestCase {
        TestCase {
            id: new_id(),
            test_scenario_id: scenario_id.to_owned(),
            name: self.name,
            result: self.result,
            message: self.message,
            created_at: Utc::now(),
        }
    }
}

// ─── TestScenario ────────────────────────────────────────────────────

/// 플랜 생성 시 사용하는 시나리오 정의
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub test_engine: TestEngine,
}

fn default_enabled() -> bool {
    true
}

impl ScenarioDefinition {
    pub fn new(name: impl Into<String>, test_engine: TestEngine) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            test_engine,
        }
    }

    /// 비활성 시나리오로 표시합니다.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// 테스트 플랜 안의 검증 단위
///
/// 상태와 엔진은 메서드로만 변경되며 전이 규칙을 강제합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestScenario {
    id: String,
    test_plan_id: String,
    name: String,
    enabled: bool,
    test_engine: TestEngine,
    status: ScenarioStatus,
    /// 취소 요청으로 실행하지 않기로 한 PENDING 시나리오
    #[serde(default)]
    skipped: bool,
}

impl TestScenario {
    fn from_definition(plan_id: &str, def: ScenarioDefinition) -> Self {
        Self {
            id: new_id(),
            test_plan_id: plan_id.to_owned(),
            name: def.name,
            enabled: def.enabled,
            test_engine: def.test_engine,
            status: ScenarioStatus::Pending,
            skipped: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn test_plan_id(&self) -> &str {
        &self.test_plan_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn test_engine(&self) -> TestEngine {
        self.test_engine
    }

    pub fn status(&self) -> ScenarioStatus {
        self.status
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// 실행 대상 여부 (활성 + 건너뛰지 않음 + PENDING)
    pub fn is_dispatchable(&self) -> bool {
        self.enabled && !self.skipped && self.status == ScenarioStatus::Pending
    }

    /// 상태를 전이합니다. 실패 시 상태는 변하지 않습니다.
    pub fn transition_to(&mut self, to: ScenarioStatus) -> Result<(), ModelError> {
        self.status = self.status.transition(to)?;
        Ok(())
    }

    /// 테스트 엔진을 변경합니다. 실행이 시작된 뒤에는 변경할 수 없습니다.
    pub fn set_test_engine(&mut self, engine: TestEngine) -> Result<(), ModelError> {
        if self.status != ScenarioStatus::Pending {
            return Err(ModelError::EngineLocked(self.id.clone()));
        }
        self.test_engine = engine;
        Ok(())
    }

    /// 문자열로 테스트 엔진을 변경합니다.
    pub fn set_test_engine_str(&mut self, engine: &str) -> Result<(), crate::TestGridError> {
        let engine = engine.parse::<TestEngine>()?;
        self.set_test_engine(engine)?;
        Ok(())
    }

    /// PENDING 시나리오를 건너뜀으로 표시합니다. 반환값은 표시 여부입니다.
    pub fn mark_skipped(&mut self) -> bool {
        if self.status == ScenarioStatus::Pending && !self.skipped {
            self.skipped = true;
            true
        } else {
            false
        }
    }
}

// ─── TestPlan ────────────────────────────────────────────────────────

/// 제품 하나에 대한 실행 단위
///
/// 상태는 저장하지 않고 [`TestPlan::status`]에서 매번 계산합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPlan {
    id: String,
    product_id: String,
    created_at: DateTime<Utc>,
    scenarios: Vec<TestScenario>,
}

impl TestPlan {
    /// 제품 아래에 새 플랜과 시나리오를 만듭니다.
    ///
    /// 시나리오 순서는 정의 순서를 유지합니다.
    pub fn new(product: &Product, definitions: Vec<ScenarioDefinition>) -> Result<Self, ValidationError> {
        if definitions.iter().any(|d| d.name.trim().is_empty()) {
            return Err(ValidationError::EmptyField("scenario.name"));
        }
        let id = new_id();
        let scenarios = definitions
            .into_iter()
            .map(|def| TestScenario::from_definition(&id, def))
            .collect();
        Ok(Self {
            id,
            product_id: product.id.clone(),
            created_at: Utc::now(),
            scenarios,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn scenarios(&self) -> &[TestScenario] {
        &self.scenarios
    }

    pub fn scenario(&self, id: &str) -> Option<&TestScenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    pub fn scenario_mut(&mut self, id: &str) -> Option<&mut TestScenario> {
        self.scenarios.iter_mut().find(|s| s.id == id)
    }

    /// 파생 플랜 상태
    pub fn status(&self) -> PlanStatus {
        aggregate_plan_status(self.scenarios.iter().map(|s| (s.enabled, s.status)))
    }

    /// 더 이상 진행될 시나리오가 없는지 확인합니다.
    ///
    /// 활성 시나리오가 모두 종료 상태이거나 건너뜀으로 표시된 경우입니다.
    pub fn is_settled(&self) -> bool {
        self.scenarios
            .iter()
            .filter(|s| s.enabled)
            .all(|s| s.status.is_terminal() || (s.skipped && s.status == ScenarioStatus::Pending))
    }
}

/// API 응답용 플랜 요약 (파생 상태 포함)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPlanView {
    pub id: String,
    pub product_id: String,
    pub created_at: DateTime<Utc>,
    pub status: PlanStatus,
    pub scenarios: Vec<TestScenarioView>,
}

/// API 응답용 시나리오 표현
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestScenarioView {
    pub id: String,
    pub test_plan_id: String,
    pub name: String,
    pub enabled: bool,
    pub test_engine: TestEngine,
    pub status: ScenarioStatus,
    pub skipped: bool,
}

impl From<&TestScenario> for TestScenarioView {
    fn from(s: &TestScenario) -> Self {
        Self {
            id: s.id.clone(),
            test_plan_id: s.test_plan_id.clone(),
            name: s.name.clone(),
            enabled: s.enabled,
            test_engine: s.test_engine,
            status: s.status,
            skipped: s.skipped,
        }
    }
}

impl From<&TestPlan> for TestPlanView {
    fn from(p: &TestPlan) -> Self {
        Self {
            id: p.id.clone(),
            product_id: p.product_id.clone(),
            created_at: p.created_at,
            status: p.status(),
            scenarios: p.scenarios.iter().map(TestScenarioView::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product::new("ProductX", "1.0.0", Channel::Lts).expect("valid product")
    }

    #[test]
    fn channel_parse_is_case_insensitive() {
        assert_eq!("lts".parse::<Channel>(), Ok(Channel::Lts));
        assert_eq!("Released".parse::<Channel>(), Ok(Channel::Released));
        assert_eq!(
            "NIGHTLY".parse::<Channel>(),
            Err(ValidationError::UnknownChannel("NIGHTLY".to_owned()))
        );
    }

    #[test]
    fn test_engine_parse() {
        assert_eq!("selenium".parse::<TestEngine>(), Ok(TestEngine::Selenium));
        assert!(matches!(
            "junit".parse::<TestEngine>(),
            Err(ValidationError::UnknownTestEngine(_))
        ));
    }

    #[test]
    fn product_rejects_empty_fields() {
        assert_eq!(
            Product::new("", "1.0", Channel::Lts),
            Err(ValidationError::EmptyField("name"))
        );
        assert_eq!(
            Product::new("p", " ", Channel::Lts),
            Err(ValidationError::EmptyField("version"))
        );
    }

    #[test]
    fn plan_keeps_definition_order_and_ownership() {
        let p = product();
        let plan = TestPlan::new(
            &p,
            vec![
                ScenarioDefinition::new("b", TestEngine::Testng),
                ScenarioDefinition::new("a", TestEngine::Jmeter),
            ],
        )
        .expect("valid plan");
        let names: Vec<_> = plan.scenarios().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(plan.scenarios().iter().all(|s| s.test_plan_id() == plan.id()));
        assert_eq!(plan.product_id(), p.id);
        assert_eq!(plan.status(), PlanStatus::Pending);
    }

    #[test]
    fn engine_is_locked_after_start() {
        let plan = TestPlan::new(&product(), vec![ScenarioDefinition::new("s", TestEngine::Jmeter)])
            .expect("valid plan");
        let mut scenario = plan.scenarios()[0].clone();
        scenario.set_test_engine(TestEngine::Selenium).expect("pending scenario");
        scenario.transition_to(ScenarioStatus::Running).expect("legal");
        assert!(matches!(
            scenario.set_test_engine(TestEngine::Testng),
            Err(ModelError::EngineLocked(_))
        ));
        assert_eq!(scenario.test_engine(), TestEngine::Selenium);
    }

    #[test]
    fn string_engine_setter_is_fallible() {
        let plan = TestPlan::new(&product(), vec![ScenarioDefinition::new("s", TestEngine::Jmeter)])
            .expect("valid plan");
        let mut scenario = plan.scenarios()[0].clone();
        assert!(scenario.set_test_engine_str("testng").is_ok());
        assert_eq!(scenario.test_engine(), TestEngine::Testng);
        assert!(scenario.set_test_engine_str("cucumber").is_err());
        assert_eq!(scenario.test_engine(), TestEngine::Testng);
    }

    #[test]
    fn invalid_transition_leaves_state() {
        let plan = TestPlan::new(&product(), vec![ScenarioDefinition::new("s", TestEngine::Jmeter)])
            .expect("valid plan");
        let mut scenario = plan.scenarios()[0].clone();
        assert!(scenario.transition_to(ScenarioStatus::Completed).is_err());
        assert_eq!(scenario.status(), ScenarioStatus::Pending);
    }

    #[test]
    fn skip_only_applies_to_pending() {
        let plan = TestPlan::new(&product(), vec![ScenarioDefinition::new("s", TestEngine::Jmeter)])
            .expect("valid plan");
        let mut pending = plan.scenarios()[0].clone();
        let mut running = pending.clone();
        assert!(pending.mark_skipped());
        assert!(!pending.mark_skipped());
        assert!(!pending.is_dispatchable());

        running.transition_to(ScenarioStatus::Running).expect("legal");
        assert!(!running.mark_skipped());
    }

    #[test]
    fn settled_ignores_disabled_scenarios() {
        let mut plan = TestPlan::new(
            &product(),
            vec![
                ScenarioDefinition::new("on", TestEngine::Testng),
                ScenarioDefinition::new("off", TestEngine::Selenium).disabled(),
            ],
        )
        .expect("valid plan");
        assert!(!plan.is_settled());
        let id = plan.scenarios()[0].id().to_owned();
        let s = plan.scenario_mut(&id).expect("scenario exists");
        s.transition_to(ScenarioStatus::Running).expect("legal");
        s.transition_to(ScenarioStatus::Completed).expect("legal");
        assert!(plan.is_settled());
        assert_eq!(plan.status(), PlanStatus::Completed);
    }

    #[test]
    fn scenario_definition_defaults_enabled() {
        let def: ScenarioDefinition =
            toml::from_str("name = \"login\"\ntest_engine = \"SELENIUM\"").expect("valid toml");
        assert!(def.enabled);
        assert_eq!(def.test_engine, TestEngine::Selenium);
    }
}
