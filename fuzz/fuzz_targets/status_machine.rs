#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use testgrid_core::{PlanStatus, ScenarioStatus, aggregate_plan_status};

#[derive(Arbitrary, Debug)]
enum FuzzStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl FuzzStatus {
    fn to_status(&self) -> ScenarioStatus {
        match self {
            FuzzStatus::Pending => ScenarioStatus::Pending,
            FuzzStatus::Running => ScenarioStatus::Running,
            FuzzStatus::Completed => ScenarioStatus::Completed,
            FuzzStatus::Error => ScenarioStatus::Error,
        }
    }
}

#[derive(Arbitrary, Debug)]
struct FuzzScenario {
    enabled: bool,
    steps: Vec<FuzzStatus>,
}

fuzz_target!(|input: Vec<FuzzScenario>| {
    let mut finals = Vec::new();

    for scenario in input.iter().take(64) {
        let mut current = ScenarioStatus::Pending;
        for step in scenario.steps.iter().take(16) {
            let to = step.to_status();
            match current.transition(to) {
                Ok(next) => {
                    assert!(!current.is_terminal(), "terminal state must not move");
                    current = next;
                }
                Err(_) => assert!(!current.can_transition_to(to)),
            }
        }
        finals.push((scenario.enabled, current));
    }

    let plan = aggregate_plan_status(finals.iter().copied());
    let enabled: Vec<ScenarioStatus> = finals
        .iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, s)| *s)
        .collect();

    if enabled.iter().any(|s| *s == ScenarioStatus::Error) {
        assert_eq!(plan, PlanStatus::Error);
    } else if enabled.is_empty() {
        assert_eq!(plan, PlanStatus::Pending);
    } else if enabled.iter().all(|s| *s == ScenarioStatus::Completed) {
        assert_eq!(plan, PlanStatus::Completed);
    }
});
