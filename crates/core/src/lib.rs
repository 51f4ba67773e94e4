//! # testgrid-core
//!
//! TestGrid 공통 크레이트입니다. 다른 모든 크레이트가 의존합니다.
//!
//! - [`status`]: 시나리오 상태 머신과 플랜 상태 파생
//! - [`types`]: Product → TestPlan → TestScenario → TestCase 엔티티 계층
//! - [`repository`]: 저장소 계약과 메모리/파일 어댑터
//! - [`registration`]: 멱등 제품 등록과 플랜 생성
//! - [`query`]: 조회 파사드
//! - [`config`]: `testgrid.toml` 설정
//! - [`plan_file`]: 테스트 플랜 정의 파일
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod error;
pub mod metrics;
pub mod plan_file;
pub mod query;
pub mod registration;
pub mod repository;
pub mod status;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, ModelError, QueryError, StorageError, TestGridError, ValidationError};

// 설정
pub use config::TestGridConfig;

// 상태
pub use status::{PlanStatus, ScenarioStatus, aggregate_plan_status};

// 도메인 타입
pub use types::{
    Channel, Product, ScenarioDefinition, TestCase, TestCaseReport, TestCaseResult, TestEngine,
    TestPlan, TestPlanView, TestScenario, TestScenarioView,
};

// 서비스
pub use plan_file::PlanFile;
pub use query::QueryService;
pub use registration::{Registration, RegistrationService};
pub use repository::{FileRepository, MemoryRepository, Repository};
