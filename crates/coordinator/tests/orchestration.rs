//! 등록부터 플랜 실행, 보고 수집까지의 통합 테스트

use std::sync::Arc;
use std::time::Duration;

use testgrid_coordinator::{
    Coordinator, CoordinatorBuilder, Dispatch, EngineAdapter, EngineError, EngineReport,
    ProcessEngine, ReportOutcome, ScenarioJob,
};
use testgrid_core::{
    FileRepository, MemoryRepository, PlanStatus, QueryService, RegistrationService, Repository,
    ScenarioDefinition, ScenarioStatus, TestCaseReport, TestCaseResult, TestEngine,
};

/// 결과를 콜백으로 보고하는 엔진 (외부 프로세스 흉내)
struct DetachedEngine(TestEngine);

impl EngineAdapter for DetachedEngine {
    fn engine(&self) -> TestEngine {
        self.0
    }

    async fn execute(&self, _job: ScenarioJob) -> Result<Dispatch, EngineError> {
        Ok(Dispatch::Detached)
    }
}

fn coordinator<R: Repository>(repo: &Arc<R>) -> Coordinator<R> {
    CoordinatorBuilder::new()
        .repository(Arc::clone(repo))
        .engine(DetachedEngine(TestEngine::Testng))
        .engine(DetachedEngine(TestEngine::Selenium))
        .engine(DetachedEngine(TestEngine::Jmeter))
        .build()
        .expect("build coordinator")
}

fn three_scenarios() -> Vec<ScenarioDefinition> {
    vec![
        ScenarioDefinition::new("A", TestEngine::Testng),
        ScenarioDefinition::new("B", TestEngine::Selenium),
        ScenarioDefinition::new("C", TestEngine::Jmeter).disabled(),
    ]
}

#[tokio::test]
async fn end_to_end_one_error_fails_the_plan() {
    // Given: 같은 제품을 두 번 등록
    let repo = Arc::new(MemoryRepository::new());
    let registration = RegistrationService::new(Arc::clone(&repo));
    let p1 = registration
        .register_product("ProductX", "1.0.0", "LTS")
        .await
        .expect("register");
    let again = registration
        .register_product("ProductX", "1.0.0", "LTS")
        .await
        .expect("register again");
    assert_eq!(p1, again);

    let plan = registration
        .create_test_plan(&p1, three_scenarios())
        .await
        .expect("plan");
    let coordinator = coordinator(&repo);

    // When: 실행 후 A는 완료, B는 에러
    let run = coordinator.run_plan(plan.id()).await.expect("run");
    assert_eq!(run.dispatched.len(), 2);

    let a = plan.scenarios()[0].id();
    let b = plan.scenarios()[1].id();
    coordinator
        .report(a, EngineReport::success(vec![TestCaseReport::pass("login")]))
        .await
        .expect("report A");
    coordinator
        .report(b, EngineReport::error("browser crashed"))
        .await
        .expect("report B");

    // Then
    let status = coordinator.wait_for_plan(plan.id()).await.expect("wait");
    assert_eq!(status, PlanStatus::Error);

    let query = QueryService::new(Arc::clone(&repo));
    let scenarios = query.test_scenarios_for_plan(plan.id()).await.expect("scenarios");
    assert_eq!(scenarios[0].status(), ScenarioStatus::Completed);
    assert_eq!(scenarios[1].status(), ScenarioStatus::Error);
    assert_eq!(scenarios[2].status(), ScenarioStatus::Pending);
    let cases = query.test_cases_for_scenario(a).await.expect("cases");
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].result, TestCaseResult::Pass);
}

#[tokio::test]
async fn disabled_scenario_does_not_block_completion() {
    let repo = Arc::new(MemoryRepository::new());
    let registration = RegistrationService::new(Arc::clone(&repo));
    let (_, plan) = registration
        .register_test_plan("ProductX", "1.0.0", "LTS", three_scenarios())
        .await
        .expect("register");
    let coordinator = coordinator(&repo);
    coordinator.run_plan(plan.id()).await.expect("run");

    let a = plan.scenarios()[0].id();
    let b = plan.scenarios()[1].id();
    coordinator
        .report(a, EngineReport::success(Vec::new()))
        .await
        .expect("report A");

    // {PENDING(disabled), RUNNING, COMPLETED} → RUNNING
    let mid = repo.find_test_plan(plan.id()).await.expect("find").expect("plan");
    assert_eq!(mid.status(), PlanStatus::Running);

    // 실패한 검사가 있어도 실행이 끝났으면 COMPLETED
    coordinator
        .report(
            b,
            EngineReport::failure(vec![TestCaseReport::fail("checkout", "assert")], "1 failed"),
        )
        .await
        .expect("report B");
    assert_eq!(
        coordinator.wait_for_plan(plan.id()).await.expect("wait"),
        PlanStatus::Completed
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_terminal_reports_accept_exactly_one() {
    let repo = Arc::new(MemoryRepository::new());
    let registration = RegistrationService::new(Arc::clone(&repo));
    let (_, plan) = registration
        .register_test_plan(
            "ProductX",
            "1.0.0",
            "LTS",
            vec![ScenarioDefinition::new("A", TestEngine::Testng)],
        )
        .await
        .expect("register");
    let coordinator = coordinator(&repo);
    coordinator.run_plan(plan.id()).await.expect("run");
    let id = plan.scenarios()[0].id().to_owned();

    let mut handles = Vec::new();
    for i in 0..8 {
        let coordinator = coordinator.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            let report = if i % 2 == 0 {
                EngineReport::success(vec![TestCaseReport::pass(format!("case-{i}"))])
            } else {
                EngineReport::error(format!("duplicate-{i}"))
                    .with_cases(vec![TestCaseReport::pass(format!("case-{i}"))])
            };
            coordinator.report(&id, report).await
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.expect("join").expect("report"));
    }
    let accepted: Vec<_> = outcomes.iter().filter(|o| o.is_accepted()).collect();
    assert_eq!(accepted.len(), 1);
    let final_status = accepted[0].status();
    assert!(
        outcomes
            .iter()
            .filter(|o| !o.is_accepted())
            .all(|o| *o == ReportOutcome::Stale { status: final_status })
    );
    // 수락된 보고의 케이스 집합 하나만 기록됨
    assert_eq!(repo.list_test_cases(&id).await.expect("cases").len(), 1);
}

#[tokio::test]
async fn subscribers_observe_every_transition() {
    let repo = Arc::new(MemoryRepository::new());
    let registration = RegistrationService::new(Arc::clone(&repo));
    let (_, plan) = registration
        .register_test_plan(
            "ProductX",
            "1.0.0",
            "PREVIEW",
            vec![ScenarioDefinition::new("A", TestEngine::Testng)],
        )
        .await
        .expect("register");
    let coordinator = coordinator(&repo);
    let mut events = coordinator.subscribe();

    coordinator.run_plan(plan.id()).await.expect("run");
    let id = plan.scenarios()[0].id();
    coordinator
        .report(id, EngineReport::success(Vec::new()))
        .await
        .expect("report");

    let running = events.recv().await.expect("running event");
    assert_eq!(running.scenario_status, ScenarioStatus::Running);
    assert_eq!(running.plan_status, PlanStatus::Running);
    let done = events.recv().await.expect("completed event");
    assert_eq!(done.scenario_id, id);
    assert_eq!(done.scenario_status, ScenarioStatus::Completed);
    assert_eq!(done.plan_status, PlanStatus::Completed);
}

#[cfg(unix)]
#[tokio::test]
async fn process_engine_results_are_persisted_to_file_repository() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = Arc::new(
        FileRepository::open(dir.path().join("testgrid.json"))
            .await
            .expect("open"),
    );
    let registration = RegistrationService::new(Arc::clone(&repo));
    let (_, plan) = registration
        .register_test_plan(
            "ProductX",
            "1.0.0",
            "LTS",
            vec![ScenarioDefinition::new("api", TestEngine::Testng)],
        )
        .await
        .expect("register");

    let engine = ProcessEngine::new(
        TestEngine::Testng,
        "sh",
        vec![
            "-c".to_owned(),
            r#"echo '{"name":"health","result":"PASS"}'; echo '{"name":"auth","result":"PASS"}'"#
                .to_owned(),
        ],
    )
    .with_timeout(Duration::from_secs(10));
    let coordinator = CoordinatorBuilder::new()
        .repository(Arc::clone(&repo))
        .engine(engine)
        .build()
        .expect("build");

    coordinator.run_plan(plan.id()).await.expect("run");
    let status = coordinator.wait_for_plan(plan.id()).await.expect("wait");
    assert_eq!(status, PlanStatus::Completed);

    let cases = repo
        .list_test_cases(plan.scenarios()[0].id())
        .await
        .expect("cases");
    let names: Vec<_> = cases.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["health", "auth"]);
}
