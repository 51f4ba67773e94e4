//! 엔진 어댑터 계약: 시나리오를 외부 테스트 엔진에 넘기는 좁은 인터페이스
//!
//! [`EngineAdapter`]는 RPITIT 기반 trait이고, 코디네이터는 엔진 종류별로
//! 서로 다른 구현을 한 맵에 담기 위해 [`DynEngineAdapter`]를 사용합니다.
//!
//! ```text
//! Coordinator ──ScenarioJob──> EngineAdapter::execute()
//!      ^                              |
//!      └──── Dispatch::Finished ──────┘   (또는 Detached + Coordinator::report 콜백)
//! ```

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use testgrid_core::status::ScenarioStatus;
use testgrid_core::types::{TestCaseReport, TestEngine};

/// 박싱된 `Send` future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 엔진에 전달되는 실행 요청
#[derive(Debug, Clone)]
pub struct ScenarioJob {
    pub plan_id: String,
    pub scenario_id: String,
    pub name: String,
    pub engine: TestEngine,
    /// 취소 요청 시 트리거됩니다. 어댑터는 이를 관찰하고 [`ReportKind::Cancelled`]로 응답해야 합니다.
    pub cancel: CancellationToken,
}

/// 종료 보고 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// 모든 검사를 실행하고 통과
    Success,
    /// 실행은 끝났지만 실패한 검사가 있음
    Failure,
    /// 엔진이 시나리오를 끝까지 실행하지 못함
    Error,
    /// 취소 요청에 대한 확인
    Cancelled,
}

impl ReportKind {
    /// 보고가 수락되었을 때 시나리오가 도달하는 상태
    pub fn target_status(self) -> ScenarioStatus {
        match self {
            Self::Success | Self::Failure => ScenarioStatus::Completed,
            Self::Error | Self::Cancelled => ScenarioStatus::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// 시나리오 하나에 대한 엔진의 종료 보고
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineReport {
    pub kind: ReportKind,
    #[serde(default)]
    pub cases: Vec<TestCaseReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl EngineReport {
    pub fn success(cases: Vec<TestCaseReport>) -> Self {
        Self {
            kind: ReportKind::Success,
            cases,
            message: None,
        }
    }

    pub fn failure(cases: Vec<TestCaseReport>, message: impl Into<String>) -> Self {
        Self {
            kind: ReportKind::Failure,
            cases,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ReportKind::Error,
            cases: Vec::new(),
            message: Some(message.into()),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            kind: ReportKind::Cancelled,
            cases: Vec::new(),
            message: Some(message.into()),
        }
    }

    /// 보고에 테스트 케이스를 덧붙입니다.
    pub fn with_cases(mut self, cases: Vec<TestCaseReport>) -> Self {
        self.cases.extend(cases);
        self
    }
}

/// `execute`의 정상 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// 엔진이 시나리오를 끝내고 보고를 돌려줌
    Finished(EngineReport),
    /// 엔진이 작업을 넘겨받았고, 결과는 나중에 `Coordinator::report`로 도착함
    Detached,
}

/// 어댑터 내부 에러
///
/// 코디네이터는 이 에러를 [`ReportKind::Error`] 보고로 변환합니다.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 엔진 프로세스 실행 실패
    #[error("failed to launch engine: {0}")]
    Launch(String),

    /// 엔진 I/O 실패
    #[error("engine io error: {0}")]
    Io(#[from] std::io::Error),

    /// 엔진이 프로토콜을 어김
    #[error("engine protocol error: {0}")]
    Protocol(String),
}

/// 테스트 엔진 어댑터
///
/// 구현체는 `job.cancel`을 관찰해야 합니다. 취소되면 가능한 빨리 실행을 멈추고
/// [`ReportKind::Cancelled`] 보고를 반환합니다.
pub trait EngineAdapter: Send + Sync + 'static {
    /// 이 어댑터가 담당하는 엔진 종류
    fn engine(&self) -> TestEngine;

    /// 시나리오를 실행합니다.
    fn execute(
        &self,
        job: ScenarioJob,
    ) -> impl Future<Output = Result<Dispatch, EngineError>> + Send;
}

/// dyn-compatible 엔진 어댑터
///
/// `EngineAdapter`를 구현한 타입은 자동으로 구현됩니다.
pub trait DynEngineAdapter: Send + Sync {
    fn engine(&self) -> TestEngine;

    fn execute(&self, job: ScenarioJob) -> BoxFuture<'_, Result<Dispatch, EngineError>>;
}

impl<T: EngineAdapter> DynEngineAdapter for T {
    fn engine(&self) -> TestEngine {
        EngineAdapter::engine(self)
    }

    fn execute(&self, job: ScenarioJob) -> BoxFuture<'_, Result<Dispatch, EngineError>> {
        Box::pin(EngineAdapter::execute(self, job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct EchoEngine;

    impl EngineAdapter for EchoEngine {
        fn engine(&self) -> TestEngine {
            TestEngine::Testng
        }

        async fn execute(&self, job: ScenarioJob) -> Result<Dispatch, EngineError> {
            Ok(Dispatch::Finished(EngineReport::success(vec![
                TestCaseReport::pass(job.name),
            ])))
        }
    }

    fn job() -> ScenarioJob {
        ScenarioJob {
            plan_id: "p".to_owned(),
            scenario_id: "s".to_owned(),
            name: "login".to_owned(),
            engine: TestEngine::Testng,
            cancel: CancellationToken::new(),
        }
    }

    #[test]
    fn report_kind_maps_to_terminal_status() {
        assert_eq!(ReportKind::Success.target_status(), ScenarioStatus::Completed);
        assert_eq!(ReportKind::Failure.target_status(), ScenarioStatus::Completed);
        assert_eq!(ReportKind::Error.target_status(), ScenarioStatus::Error);
        assert_eq!(ReportKind::Cancelled.target_status(), ScenarioStatus::Error);
    }

    #[test]
    fn report_json_shape() {
        let report = EngineReport::failure(
            vec![TestCaseReport::fail("checkout", "timeout")],
            "1 of 1 failed",
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "failure");
        assert_eq!(json["cases"][0]["result"], "FAIL");

        let parsed: EngineReport = serde_json::from_str(r#"{"kind":"success"}"#).unwrap();
        assert_eq!(parsed, EngineReport::success(Vec::new()));
    }

    #[tokio::test]
    async fn dyn_adapter_delegates() {
        let adapter: Arc<dyn DynEngineAdapter> = Arc::new(EchoEngine);
        assert_eq!(adapter.engine(), TestEngine::Testng);
        let outcome = adapter.execute(job()).await.unwrap();
        match outcome {
            Dispatch::Finished(report) => {
                assert_eq!(report.kind, ReportKind::Success);
                assert_eq!(report.cases[0].name, "login");
            }
            Dispatch::Detached => panic!("echo engine always finishes"),
        }
    }
}
