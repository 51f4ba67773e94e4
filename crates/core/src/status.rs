//! 상태 모델: 시나리오/플랜 실행 상태 머신
//!
//! # 시나리오 상태 전이
//! ```text
//! PENDING → RUNNING → COMPLETED
//!                   ↘ ERROR
//! ```
//! COMPLETED와 ERROR는 종료 상태입니다. 재실행은 새 TestPlan을 만듭니다.
//!
//! 플랜 상태는 저장하지 않고 [`aggregate_plan_status`]로 매번 계산합니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// 테스트 시나리오 실행 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioStatus {
    /// 실행 예정 (또는 비활성/취소로 건너뜀)
    #[default]
    Pending,
    /// 테스트 엔진에서 실행 중
    Running,
    /// 실행 완료
    Completed,
    /// 실행 오류
    Error,
}

impl ScenarioStatus {
    /// 모든 상태 값
    pub const ALL: [ScenarioStatus; 4] = [
        ScenarioStatus::Pending,
        ScenarioStatus::Running,
        ScenarioStatus::Completed,
        ScenarioStatus::Error,
    ];

    /// 종료 상태 여부 (COMPLETED, ERROR)
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// `self → to` 전이가 허용되는지 확인합니다.
    pub fn can_transition_to(self, to: ScenarioStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Error)
        )
    }

    /// 전이를 검증하고 새 상태를 반환합니다.
    ///
    /// 허용되지 않는 전이는 [`ModelError::InvalidStateTransition`]으로 실패합니다.
    pub fn transition(self, to: ScenarioStatus) -> Result<ScenarioStatus, ModelError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(ModelError::InvalidStateTransition { from: self, to })
        }
    }

    /// 와이어 문자열 (`"PENDING"` 등)
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "ERROR" => Ok(Self::Error),
            other => Err(format!("unknown scenario status: {other}")),
        }
    }
}

/// 테스트 플랜 집계 상태
///
/// 직접 설정할 수 없으며 시나리오 상태로부터만 계산됩니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

impl PlanStatus {
    /// 와이어 문자열
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 시나리오 상태들로부터 플랜 상태를 계산합니다.
///
/// 입력은 `(enabled, status)` 쌍이며 비활성 시나리오는 무시됩니다.
///
/// # 집계 규칙
/// - 활성 시나리오 중 하나라도 ERROR → ERROR
/// - 하나라도 RUNNING → RUNNING
/// - 모든 활성 시나리오가 COMPLETED (최소 한 개) → COMPLETED
/// - 그 외 → PENDING
pub fn aggregate_plan_status<I>(scenarios: I) -> PlanStatus
where
    I: IntoIterator<Item = (bool, ScenarioStatus)>,
{
    let mut enabled = 0usize;
    let mut completed = 0usize;
    let mut running = false;

    for (is_enabled, status) in scenarios {
        if !is_enabled {
            continue;
        }
        enabled += 1;
        match status {
            ScenarioStatus::Error => return PlanStatus::Error,
            ScenarioStatus::Running => running = true,
            ScenarioStatus::Completed => completed += 1,
            ScenarioStatus::Pending => {}
        }
    }

    if running {
        PlanStatus::Running
    } else if enabled > 0 && completed == enabled {
        PlanStatus::Completed
    } else {
        PlanStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use ScenarioStatus::{Completed, Error, Pending, Running};

    #[test]
    fn only_three_transitions_are_legal() {
        let mut legal = Vec::new();
        for from in ScenarioStatus::ALL {
            for to in ScenarioStatus::ALL {
                if from.can_transition_to(to) {
                    legal.push((from, to));
                }
            }
        }
        assert_eq!(
            legal,
            vec![(Pending, Running), (Running, Completed), (Running, Error)]
        );
    }

    #[test]
    fn illegal_transition_reports_both_states() {
        let err = Completed.transition(Running).unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidStateTransition {
                from: Completed,
                to: Running
            }
        );
        assert!(Pending.transition(Completed).is_err());
        assert!(Running.transition(Running).is_err());
    }

    #[test]
    fn aggregation_excludes_disabled() {
        // disabled PENDING + RUNNING + COMPLETED
        let mut states = vec![(false, Pending), (true, Running), (true, Completed)];
        assert_eq!(aggregate_plan_status(states.clone()), PlanStatus::Running);

        states[1].1 = Error;
        assert_eq!(aggregate_plan_status(states.clone()), PlanStatus::Error);

        states[1].1 = Completed;
        assert_eq!(aggregate_plan_status(states), PlanStatus::Completed);
    }

    #[test]
    fn error_wins_over_running() {
        let states = [(true, Running), (true, Error), (true, Pending)];
        assert_eq!(aggregate_plan_status(states), PlanStatus::Error);
    }

    #[test]
    fn no_enabled_scenarios_is_pending() {
        assert_eq!(aggregate_plan_status([]), PlanStatus::Pending);
        assert_eq!(
            aggregate_plan_status([(false, Pending), (false, Pending)]),
            PlanStatus::Pending
        );
    }

    #[test]
    fn status_wire_form() {
        assert_eq!(
            serde_json::to_string(&Running).expect("serialize"),
            "\"RUNNING\""
        );
        assert_eq!("completed".parse::<ScenarioStatus>(), Ok(Completed));
        assert!("DONE".parse::<ScenarioStatus>().is_err());
    }

    fn any_status() -> impl Strategy<Value = ScenarioStatus> {
        prop::sample::select(ScenarioStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn transition_sequences_never_leave_the_machine(requests in prop::collection::vec(any_status(), 0..32)) {
            let mut current = Pending;
            for to in requests {
                let before = current;
                match current.transition(to) {
                    Ok(next) => {
                        prop_assert!(matches!(
                            (before, next),
                            (Pending, Running) | (Running, Completed) | (Running, Error)
                        ));
                        current = next;
                    }
                    Err(_) => prop_assert_eq!(current, before),
                }
            }
        }

        #[test]
        fn completed_plan_implies_all_enabled_completed(states in prop::collection::vec((any::<bool>(), any_status()), 0..16)) {
            let plan = aggregate_plan_status(states.clone());
            let enabled: Vec<_> = states.iter().filter(|(e, _)| *e).map(|(_, s)| *s).collect();
            if plan == PlanStatus::Completed {
                prop_assert!(!enabled.is_empty());
                prop_assert!(enabled.iter().all(|s| *s == Completed));
            }
            if enabled.contains(&Error) {
                prop_assert_eq!(plan, PlanStatus::Error);
            }
        }
    }
}
