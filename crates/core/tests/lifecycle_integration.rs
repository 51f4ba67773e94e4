//! 등록 → 플랜 생성 → 상태 전이 → 조회 통합 테스트
//!
//! 메모리 저장소와 파일 저장소에서 같은 흐름을 검증합니다.

use std::sync::Arc;

use testgrid_core::{
    FileRepository, MemoryRepository, PlanFile, PlanStatus, QueryService, RegistrationService,
    Repository, ScenarioStatus, TestCaseReport,
};

const PLAN: &str = r#"
[[scenario]]
name = "A"
test_engine = "testng"

[[scenario]]
name = "B"
test_engine = "selenium"
"#;

async fn run_lifecycle<R: Repository>(repo: Arc<R>) {
    let registration = RegistrationService::new(Arc::clone(&repo));
    let query = QueryService::new(Arc::clone(&repo));
    let defs = PlanFile::parse(PLAN).expect("plan file").into_definitions();

    let (product, plan) = registration
        .register_test_plan("ProductX", "1.0.0", "LTS", defs)
        .await
        .expect("register");
    assert_eq!(plan.status(), PlanStatus::Pending);

    let a = plan.scenarios()[0].id().to_owned();
    let b = plan.scenarios()[1].id().to_owned();

    for id in [&a, &b] {
        assert!(
            repo.update_scenario_status(id, ScenarioStatus::Pending, ScenarioStatus::Running)
                .await
                .expect("dispatch")
        );
    }
    assert_eq!(
        query.test_plan(plan.id()).await.expect("plan").status(),
        PlanStatus::Running
    );

    assert!(
        repo.complete_scenario(
            &a,
            ScenarioStatus::Running,
            ScenarioStatus::Completed,
            vec![TestCaseReport::pass("login").into_case(&a)],
        )
        .await
        .expect("complete A")
    );
    assert!(
        repo.complete_scenario(&b, ScenarioStatus::Running, ScenarioStatus::Error, Vec::new())
            .await
            .expect("complete B")
    );

    let stored = query.test_plan(plan.id()).await.expect("plan");
    assert_eq!(stored.status(), PlanStatus::Error);
    assert!(stored.is_settled());

    let cases = query.test_cases_for_scenario(&a).await.expect("cases");
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].name, "login");
    assert!(query.test_cases_for_scenario(&b).await.expect("cases").is_empty());

    let plans = query.test_plans_for_product(&product.id).await.expect("plans");
    assert_eq!(plans.len(), 1);
}

#[tokio::test]
async fn lifecycle_on_memory_repository() {
    run_lifecycle(Arc::new(MemoryRepository::new())).await;
}

#[tokio::test]
async fn lifecycle_on_file_repository_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("testgrid.json");

    let repo = Arc::new(FileRepository::open(&path).await.expect("open"));
    run_lifecycle(Arc::clone(&repo)).await;
    drop(repo);

    let reopened = FileRepository::open(&path).await.expect("reopen");
    let product = reopened
        .find_product_by_key("ProductX", "1.0.0", testgrid_core::Channel::Lts)
        .await
        .expect("lookup")
        .expect("product persisted");
    let plans = reopened.list_test_plans(&product.id).await.expect("plans");
    assert_eq!(plans[0].status(), PlanStatus::Error);
}
