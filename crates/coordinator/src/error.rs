//! 코디네이터 에러 타입
//!
//! [`CoordinatorError`]는 `From<CoordinatorError> for TestGridError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use testgrid_core::error::{ModelError, StorageError, TestGridError};
use testgrid_core::status::ScenarioStatus;
use testgrid_core::types::TestEngine;

/// 오케스트레이션 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// 상태 머신 위반 (엔진 프로토콜 오류)
    #[error("invalid state transition for scenario '{scenario_id}': {from} -> {to}")]
    InvalidStateTransition {
        scenario_id: String,
        from: ScenarioStatus,
        to: ScenarioStatus,
    },

    /// 시나리오를 찾을 수 없음
    #[error("test scenario not found: {0}")]
    ScenarioNotFound(String),

    /// 플랜을 찾을 수 없음
    #[error("test plan not found: {0}")]
    PlanNotFound(String),

    /// 시나리오 엔진에 대한 어댑터가 등록되지 않음
    #[error("no adapter registered for test engine {0}")]
    EngineUnavailable(TestEngine),

    /// 종료 중이라 새 실행을 받지 않음
    #[error("coordinator is shutting down")]
    ShuttingDown,

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },

    /// 저장소 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CoordinatorError {
    /// 호출자가 잘못된 ID를 보낸 경우인지 확인합니다.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ScenarioNotFound(_) | Self::PlanNotFound(_))
    }
}

impl From<CoordinatorError> for TestGridError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::InvalidStateTransition { from, to, .. } => {
                TestGridError::Model(ModelError::InvalidStateTransition { from, to })
            }
            CoordinatorError::Storage(e) => TestGridError::Storage(e),
            other => TestGridError::Coordinator(other.to_string()),
        }
    }
}
