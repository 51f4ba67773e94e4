//! 코디네이터 설정
//!
//! [`OrchestrationConfig`]는 core의 [`CoordinatorConfig`](testgrid_core::config::CoordinatorConfig)를
//! 기반으로 코디네이터 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use testgrid_core::config::TestGridConfig;
//! use testgrid_coordinator::config::OrchestrationConfig;
//!
//! let core_config = TestGridConfig::default();
//! let config = OrchestrationConfig::from_core(&core_config.coordinator);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoordinatorError;

/// 코디네이터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// 동시에 엔진을 점유하는 시나리오 수
    pub max_concurrent_scenarios: usize,
    /// 상태 이벤트 브로드캐스트 용량
    pub event_channel_capacity: usize,
    /// 취소 요청 후 엔진 응답 대기 시간 (초)
    pub cancel_grace_secs: u64,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self::from_core(&testgrid_core::config::CoordinatorConfig::default())
    }
}

/// 설정 상한값 상수
const MAX_CONCURRENT_SCENARIOS: usize = 1024;
const MAX_EVENT_CHANNEL_CAPACITY: usize = 65_536;
const MAX_CANCEL_GRACE_SECS: u64 = 3600;

impl OrchestrationConfig {
    /// core의 `CoordinatorConfig`에서 코디네이터 설정을 생성합니다.
    pub fn from_core(core: &testgrid_core::config::CoordinatorConfig) -> Self {
        Self {
            max_concurrent_scenarios: core.max_concurrent_scenarios,
            event_channel_capacity: core.event_channel_capacity,
            cancel_grace_secs: core.cancel_grace_secs,
        }
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), CoordinatorError> {
        if self.max_concurrent_scenarios == 0
            || self.max_concurrent_scenarios > MAX_CONCURRENT_SCENARIOS
        {
            return Err(CoordinatorError::Config {
                field: "max_concurrent_scenarios".to_owned(),
                reason: format!("must be 1-{MAX_CONCURRENT_SCENARIOS}"),
            });
        }

        if self.event_channel_capacity == 0
            || self.event_channel_capacity > MAX_EVENT_CHANNEL_CAPACITY
        {
            return Err(CoordinatorError::Config {
                field: "event_channel_capacity".to_owned(),
                reason: format!("must be 1-{MAX_EVENT_CHANNEL_CAPACITY}"),
            });
        }

        if self.cancel_grace_secs > MAX_CANCEL_GRACE_SECS {
            return Err(CoordinatorError::Config {
                field: "cancel_grace_secs".to_owned(),
                reason: format!("must be 0-{MAX_CANCEL_GRACE_SECS}"),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = OrchestrationConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_concurrent_scenarios, 8);
        assert_eq!(config.cancel_grace(), Duration::from_secs(30));
    }

    #[test]
    fn from_core_copies_fields() {
        let core = testgrid_core::config::CoordinatorConfig {
            max_concurrent_scenarios: 3,
            event_channel_capacity: 16,
            cancel_grace_secs: 5,
        };
        let config = OrchestrationConfig::from_core(&core);
        assert_eq!(config.max_concurrent_scenarios, 3);
        assert_eq!(config.event_channel_capacity, 16);
        assert_eq!(config.cancel_grace_secs, 5);
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let config = OrchestrationConfig {
            max_concurrent_scenarios: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = OrchestrationConfig {
            event_channel_capacity: 1_000_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
