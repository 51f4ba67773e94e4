//! # testgrid-coordinator
//!
//! 테스트 플랜 오케스트레이션 크레이트입니다.
//!
//! - [`Coordinator`]: 시나리오 디스패치, 종료 보고 수집, 상태 이벤트 발행, 취소
//! - [`EngineAdapter`]: 외부 테스트 엔진과의 좁은 계약
//! - [`ProcessEngine`]: 설정된 명령을 실행하는 기본 어댑터

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod process;

pub use config::OrchestrationConfig;
pub use coordinator::{
    CancelOutcome, CancelSummary, Coordinator, CoordinatorBuilder, PlanRun, ReportOutcome,
    StatusEvent,
};
pub use engine::{
    BoxFuture, Dispatch, DynEngineAdapter, EngineAdapter, EngineError, EngineReport, ReportKind,
    ScenarioJob,
};
pub use error::CoordinatorError;
pub use process::ProcessEngine;
