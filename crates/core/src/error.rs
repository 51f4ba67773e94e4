//! 에러 타입: 도메인별 에러 정의
//!
//! 에러 분류:
//! - [`ValidationError`]: 잘못된 입력 (알 수 없는 채널 등). 부수 효과 전에 거부됩니다.
//! - [`StorageError::DuplicateProduct`]: 등록 서비스가 "이미 존재함"으로 흡수합니다.
//! - [`ModelError::InvalidStateTransition`]: 상태 머신 위반. 호출자에게 그대로 전달됩니다.
//! - [`QueryError::NotFound`]: 조회의 정상 결과. 인프라 장애와 구분됩니다.

use crate::status::ScenarioStatus;

/// TestGrid 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum TestGridError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 입력 검증 에러
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// 엔티티 모델 에러
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// 조회 에러
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 오케스트레이션 에러
    #[error("coordinator error: {0}")]
    Coordinator(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 입력 검증 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// 정의되지 않은 채널
    #[error("Channel {0} is not defined in the available channels enum")]
    UnknownChannel(String),

    /// 정의되지 않은 테스트 엔진
    #[error("test engine {0} is not defined in the available test engines enum")]
    UnknownTestEngine(String),

    /// 비어 있으면 안 되는 필드
    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),
}

/// 엔티티 모델 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// 허용되지 않는 상태 전이
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        from: ScenarioStatus,
        to: ScenarioStatus,
    },

    /// 실행이 시작된 시나리오의 엔진 변경 시도
    #[error("test engine of scenario '{0}' is locked once execution has started")]
    EngineLocked(String),

    /// RUNNING 이전의 시나리오에 테스트 케이스 기록 시도
    #[error("scenario '{0}' has not started, test cases cannot be recorded")]
    NotStarted(String),
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// (name, version, channel) 유일성 제약 위반
    #[error("duplicate product: {name} {version} {channel}")]
    DuplicateProduct {
        name: String,
        version: String,
        channel: String,
    },

    /// 참조 대상 엔티티가 없음
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// 참조 무결성 위반
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// 저장 파일 I/O 실패
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),

    /// 스냅샷 직렬화/역직렬화 실패
    #[error("storage serialization failed: {0}")]
    Serialization(String),
}

impl StorageError {
    /// 중복 키 충돌 여부
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateProduct { .. })
    }
}

/// 조회 에러
///
/// `NotFound`는 정상 결과이며 재시도할 필요가 없습니다.
/// `Infrastructure`는 재시도 여부를 호출자가 결정합니다.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// 요청한 ID의 엔티티가 없음
    #[error("Unable to find the requested {entity} by id : '{id}'")]
    NotFound { entity: &'static str, id: String },

    /// 저장소 장애
    #[error("infrastructure failure: {0}")]
    Infrastructure(#[from] StorageError),
}

impl QueryError {
    /// "찾을 수 없음" 결과인지 확인합니다.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
