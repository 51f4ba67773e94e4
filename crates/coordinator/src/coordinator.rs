//! 오케스트레이션 코디네이터: 플랜 실행, 엔진 보고 수집, 취소
//!
//! [`Coordinator`]는 플랜의 활성 시나리오를 엔진 어댑터로 디스패치하고,
//! 엔진의 종료 보고를 받아 시나리오 상태 머신을 진행시킵니다.
//!
//! # 내부 아키텍처
//! ```text
//! run_plan ──CAS PENDING→RUNNING──> spawn(scenario task)
//!                                        |
//!                                   Semaphore (max_concurrent_scenarios)
//!                                        |
//!                                   EngineAdapter.execute()
//!                                        |
//! POST /report ──────────────────> report() ──CAS RUNNING→{COMPLETED,ERROR} + TestCases
//!                                        |
//!                                   broadcast StatusEvent
//! ```
//!
//! 시나리오별 상호 배제는 저장소의 compare-and-set으로 보장합니다.
//! 같은 시나리오에 대한 두 종료 보고 중 정확히 하나만 수락되고,
//! 나머지는 [`ReportOutcome::Stale`]이 됩니다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use testgrid_core::metrics as m;
use testgrid_core::repository::Repository;
use testgrid_core::status::{PlanStatus, ScenarioStatus};
use testgrid_core::types::{TestEngine, TestPlan, TestScenario};

use crate::config::OrchestrationConfig;
use crate::engine::{DynEngineAdapter, Dispatch, EngineAdapter, EngineReport, ScenarioJob};
use crate::error::CoordinatorError;

/// 시나리오 상태가 바뀔 때마다 발행되는 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    pub plan_id: String,
    pub scenario_id: String,
    pub scenario_status: ScenarioStatus,
    /// 전이 직후 다시 계산한 플랜 상태
    pub plan_status: PlanStatus,
}

/// 종료 보고 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// 보고가 수락되어 시나리오가 `status`로 전이됨
    Accepted { status: ScenarioStatus },
    /// 이미 종료된 시나리오에 대한 보고. 상태는 바뀌지 않음
    Stale { status: ScenarioStatus },
}

impl ReportOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Stale { .. } => "stale",
        }
    }

    /// 처리 후 시나리오 상태
    pub fn status(&self) -> ScenarioStatus {
        match self {
            Self::Accepted { status } | Self::Stale { status } => *status,
        }
    }
}

/// `run_plan` 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRun {
    pub plan_id: String,
    /// RUNNING으로 디스패치된 시나리오 ID (정의 순서)
    pub dispatched: Vec<String>,
    /// 비활성이거나 건너뜀 표시되어 실행하지 않은 시나리오 수
    pub not_dispatched: usize,
}

/// 시나리오 취소 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// PENDING 시나리오를 건너뜀으로 표시함
    Skipped,
    /// RUNNING 시나리오에 취소를 요청함. 엔진 확인 후 ERROR가 됨
    Requested,
    /// 이미 종료된 시나리오
    AlreadyFinished,
}

/// 플랜 취소 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CancelSummary {
    pub skipped: usize,
    pub requested: usize,
    pub already_finished: usize,
}

/// 실행 중인 시나리오의 로컬 상태
struct InFlight {
    token: CancellationToken,
    started: Instant,
    engine: TestEngine,
}

struct Shared<R: Repository> {
    repository: Arc<R>,
    engines: HashMap<TestEngine, Arc<dyn DynEngineAdapter>>,
    permits: Arc<Semaphore>,
    events: broadcast::Sender<StatusEvent>,
    /// 시나리오 ID → 실행 상태. 디스패치 CAS와 함께 잠금
    in_flight: Mutex<HashMap<String, InFlight>>,
    /// 취소 유예 타이머가 걸린 시나리오 ID. 시나리오당 최대 하나
    grace_timers: Mutex<HashSet<String>>,
    root: CancellationToken,
    tracker: TaskTracker,
    cancel_grace: Duration,
    scenarios_dispatched: AtomicU64,
    reports_accepted: AtomicU64,
    reports_stale: AtomicU64,
}

/// 오케스트레이션 코디네이터
///
/// 복제 비용이 낮으며 모든 복제본이 같은 상태를 공유합니다.
///
/// # 사용 예시
/// ```ignore
/// let coordinator = CoordinatorBuilder::new()
///     .repository(repo)
///     .engine(ProcessEngine::new(TestEngine::Testng, "run-suite", vec![]))
///     .build()?;
///
/// let run = coordinator.run_plan(plan.id()).await?;
/// let status = coordinator.wait_for_plan(plan.id()).await?;
/// ```
pub struct Coordinator<R: Repository> {
    shared: Arc<Shared<R>>,
}

impl<R: Repository> Clone for Coordinator<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: Repository> Coordinator<R> {
    /// 디스패치된 시나리오 수를 반환합니다.
    pub fn scenarios_dispatched(&self) -> u64 {
        self.shared.scenarios_dispatched.load(Ordering::Relaxed)
    }

    /// 수락된 종료 보고 수를 반환합니다.
    pub fn reports_accepted(&self) -> u64 {
        self.shared.reports_accepted.load(Ordering::Relaxed)
    }

    /// 무시된 (stale) 보고 수를 반환합니다.
    pub fn reports_stale(&self) -> u64 {
        self.shared.reports_stale.load(Ordering::Relaxed)
    }

    /// 이 프로세스에서 실행 중인 시나리오 수
    pub async fn in_flight(&self) -> usize {
        self.shared.in_flight.lock().await.len()
    }

    /// 어댑터가 등록된 엔진 목록
    pub fn registered_engines(&self) -> Vec<TestEngine> {
        TestEngine::ALL
            .into_iter()
            .filter(|e| self.shared.engines.contains_key(e))
            .collect()
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.shared.repository
    }

    /// 종료 중인지 확인합니다.
    pub fn is_shutting_down(&self) -> bool {
        self.shared.root.is_cancelled()
    }

    /// 상태 이벤트를 구독합니다.
    ///
    /// 구독 이후 발생한 이벤트만 받습니다.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.shared.events.subscribe()
    }

    /// 플랜을 실행합니다.
    ///
    /// 활성 PENDING 시나리오를 정의 순서대로 RUNNING으로 전이시키고 엔진 작업을
    /// 스폰한 뒤 즉시 반환합니다. 완료는 [`subscribe`](Self::subscribe)나
    /// [`wait_for_plan`](Self::wait_for_plan)으로 관찰합니다.
    ///
    /// # Errors
    /// - `PlanNotFound`: 플랜이 없음
    /// - `InvalidStateTransition`: 이미 실행된 플랜 (재실행은 새 플랜을 만들어야 함)
    /// - `EngineUnavailable`: 시나리오 엔진의 어댑터가 없음. 아무것도 디스패치하지 않음
    pub async fn run_plan(&self, plan_id: &str) -> Result<PlanRun, CoordinatorError> {
        if self.is_shutting_down() {
            return Err(CoordinatorError::ShuttingDown);
        }

        let plan = self
            .shared
            .repository
            .find_test_plan(plan_id)
            .await?
            .ok_or_else(|| CoordinatorError::PlanNotFound(plan_id.to_owned()))?;

        if let Some(started) = plan
            .scenarios()
            .iter()
            .find(|s| s.is_enabled() && s.status() != ScenarioStatus::Pending)
        {
            return Err(CoordinatorError::InvalidStateTransition {
                scenario_id: started.id().to_owned(),
                from: started.status(),
                to: ScenarioStatus::Running,
            });
        }

        let targets: Vec<&TestScenario> =
            plan.scenarios().iter().filter(|s| s.is_dispatchable()).collect();

        for scenario in &targets {
            if !self.shared.engines.contains_key(&scenario.test_engine()) {
                return Err(CoordinatorError::EngineUnavailable(scenario.test_engine()));
            }
        }

        info!(
            plan_id,
            scenarios = targets.len(),
            total = plan.scenarios().len(),
            "running test plan"
        );

        let mut dispatched = Vec::with_capacity(targets.len());
        for scenario in targets {
            if self.dispatch(&plan, scenario).await? {
                dispatched.push(scenario.id().to_owned());
            }
        }

        Ok(PlanRun {
            plan_id: plan_id.to_owned(),
            not_dispatched: plan.scenarios().len() - dispatched.len(),
            dispatched,
        })
    }

    /// 시나리오 하나를 RUNNING으로 전이시키고 엔진 작업을 스폰합니다.
    ///
    /// 다른 호출이 먼저 전이시켰거나 건너뜀 표시된 경우 `false`입니다.
    async fn dispatch(&self, plan: &TestPlan, scenario: &TestScenario) -> Result<bool, CoordinatorError> {
        let engine = scenario.test_engine();
        let adapter = self
            .shared
            .engines
            .get(&engine)
            .cloned()
            .ok_or(CoordinatorError::EngineUnavailable(engine))?;

        let token = self.shared.root.child_token();
        {
            let mut in_flight = self.shared.in_flight.lock().await;
            let won = self
                .shared
                .repository
                .update_scenario_status(scenario.id(), ScenarioStatus::Pending, ScenarioStatus::Running)
                .await?;
            if !won {
                debug!(scenario_id = scenario.id(), "scenario no longer dispatchable, skipping");
                return Ok(false);
            }
            in_flight.insert(
                scenario.id().to_owned(),
                InFlight {
                    token: token.clone(),
                    started: Instant::now(),
                    engine,
                },
            );
        }

        self.shared.scenarios_dispatched.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::SCENARIOS_DISPATCHED_TOTAL, m::LABEL_ENGINE => engine.as_str())
            .increment(1);
        metrics::gauge!(m::SCENARIOS_IN_FLIGHT).increment(1.0);

        info!(
            plan_id = plan.id(),
            scenario_id = scenario.id(),
            scenario = scenario.name(),
            engine = %engine,
            "scenario dispatched"
        );
        self.publish(plan.id(), scenario.id(), ScenarioStatus::Running).await;

        let job = ScenarioJob {
            plan_id: plan.id().to_owned(),
            scenario_id: scenario.id().to_owned(),
            name: scenario.name().to_owned(),
            engine,
            cancel: token,
        };
        let this = self.clone();
        self.shared.tracker.spawn(async move {
            this.execute(adapter, job).await;
        });

        Ok(true)
    }

    /// 워커 슬롯을 얻은 뒤 엔진을 실행하고 결과를 보고합니다.
    async fn execute(&self, adapter: Arc<dyn DynEngineAdapter>, job: ScenarioJob) {
        let scenario_id = job.scenario_id.clone();
        let cancel = job.cancel.clone();

        let permit = tokio::select! {
            permit = Arc::clone(&self.shared.permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    self.settle(&scenario_id, EngineReport::error("worker pool closed")).await;
                    return;
                }
            },
            _ = cancel.cancelled() => {
                self.settle(&scenario_id, EngineReport::cancelled("cancelled before the engine started")).await;
                return;
            }
        };

        debug!(scenario_id = scenario_id.as_str(), "engine slot acquired");
        let result = adapter.execute(job).await;
        drop(permit);

        match result {
            Ok(Dispatch::Finished(report)) => self.settle(&scenario_id, report).await,
            Ok(Dispatch::Detached) => {
                debug!(scenario_id = scenario_id.as_str(), "engine will report asynchronously");
            }
            Err(e) => {
                error!(scenario_id = scenario_id.as_str(), error = %e, "engine adapter failed");
                self.settle(&scenario_id, EngineReport::error(e.to_string())).await;
            }
        }
    }

    /// 내부 보고 경로. 에러는 로그로만 남깁니다.
    async fn settle(&self, scenario_id: &str, report: EngineReport) {
        if let Err(e) = self.report(scenario_id, report).await {
            error!(scenario_id, error = %e, "failed to record engine report");
        }
    }

    /// 엔진의 종료 보고를 처리합니다.
    ///
    /// RUNNING 시나리오에 대한 첫 보고만 수락되며, 상태 전이와 테스트 케이스
    /// 기록은 하나의 원자적 단계로 이루어집니다.
    ///
    /// # Errors
    /// - `ScenarioNotFound`: 시나리오가 없음
    /// - `InvalidStateTransition`: 디스패치되지 않은 (PENDING) 시나리오에 대한 보고
    pub async fn report(
        &self,
        scenario_id: &str,
        report: EngineReport,
    ) -> Result<ReportOutcome, CoordinatorError> {
        let scenario = self
            .shared
            .repository
            .find_scenario(scenario_id)
            .await?
            .ok_or_else(|| CoordinatorError::ScenarioNotFound(scenario_id.to_owned()))?;

        let EngineReport {
            kind,
            cases,
            message,
        } = report;
        let target = kind.target_status();

        match scenario.status() {
            ScenarioStatus::Pending => {
                warn!(scenario_id, to = %target, "report for a scenario that was never dispatched");
                return Err(CoordinatorError::InvalidStateTransition {
                    scenario_id: scenario_id.to_owned(),
                    from: ScenarioStatus::Pending,
                    to: target,
                });
            }
            ScenarioStatus::Completed | ScenarioStatus::Error => {
                return Ok(self.stale(scenario_id, scenario.status()));
            }
            ScenarioStatus::Running => {}
        }

        let cases = cases.into_iter().map(|c| c.into_case(scenario_id)).collect::<Vec<_>>();
        let case_count = cases.len();
        let applied = self
            .shared
            .repository
            .complete_scenario(scenario_id, ScenarioStatus::Running, target, cases)
            .await?;

        if !applied {
            // 동시에 도착한 다른 보고가 먼저 수락됨
            let current = self
                .shared
                .repository
                .find_scenario(scenario_id)
                .await?
                .map(|s| s.status())
                .unwrap_or(target);
            return Ok(self.stale(scenario_id, current));
        }

        let entry = self.shared.in_flight.lock().await.remove(scenario_id);
        if let Some(entry) = entry {
            metrics::gauge!(m::SCENARIOS_IN_FLIGHT).decrement(1.0);
            metrics::histogram!(m::SCENARIO_DURATION_SECONDS, m::LABEL_ENGINE => entry.engine.as_str())
                .record(entry.started.elapsed().as_secs_f64());
        }
        self.shared.reports_accepted.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::REPORTS_ACCEPTED_TOTAL, m::LABEL_STATUS => target.as_str()).increment(1);

        info!(
            plan_id = scenario.test_plan_id(),
            scenario_id,
            kind = kind.as_str(),
            status = %target,
            cases = case_count,
            message = message.as_deref().unwrap_or(""),
            "scenario finished"
        );
        self.publish(scenario.test_plan_id(), scenario_id, target).await;

        Ok(ReportOutcome::Accepted { status: target })
    }

    fn stale(&self, scenario_id: &str, status: ScenarioStatus) -> ReportOutcome {
        self.shared.reports_stale.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::REPORTS_STALE_TOTAL).increment(1);
        warn!(scenario_id, status = %status, "stale report dropped");
        ReportOutcome::Stale { status }
    }

    /// 플랜 상태를 다시 계산하여 이벤트를 발행합니다.
    async fn publish(&self, plan_id: &str, scenario_id: &str, scenario_status: ScenarioStatus) {
        let plan_status = match self.shared.repository.find_test_plan(plan_id).await {
            Ok(Some(plan)) => plan.status(),
            Ok(None) => {
                warn!(plan_id, "plan disappeared while publishing status");
                return;
            }
            Err(e) => {
                warn!(plan_id, error = %e, "failed to recompute plan status");
                return;
            }
        };
        debug!(plan_id, scenario_id, scenario_status = %scenario_status, plan_status = %plan_status, "status changed");

        // 구독자가 없으면 전송이 실패하지만 무시해도 됨
        let _ = self.shared.events.send(StatusEvent {
            plan_id: plan_id.to_owned(),
            scenario_id: scenario_id.to_owned(),
            scenario_status,
            plan_status,
        });
    }

    /// 플랜이 더 진행되지 않을 때까지 기다린 뒤 최종 상태를 반환합니다.
    ///
    /// 활성 시나리오가 모두 종료되었거나 건너뜀 표시된 상태를 뜻합니다.
    /// 아직 실행하지 않은 플랜은 실행되어 끝날 때까지 기다립니다.
    pub async fn wait_for_plan(&self, plan_id: &str) -> Result<PlanStatus, CoordinatorError> {
        let mut events = self.subscribe();
        loop {
            let plan = self
                .shared
                .repository
                .find_test_plan(plan_id)
                .await?
                .ok_or_else(|| CoordinatorError::PlanNotFound(plan_id.to_owned()))?;
            if plan.is_settled() {
                return Ok(plan.status());
            }

            loop {
                match events.recv().await {
                    Ok(event) if event.plan_id == plan_id => break,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(plan_id, skipped, "status subscriber lagged, re-reading plan");
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(plan.status()),
                }
            }
        }
    }

    /// 시나리오 취소를 요청합니다.
    ///
    /// PENDING 시나리오는 즉시 건너뜀으로 표시되어 PENDING으로 남고,
    /// RUNNING 시나리오는 엔진에 취소를 알린 뒤 확인 보고가 오면 ERROR가 됩니다.
    /// 엔진이 `cancel_grace_secs` 안에 확인하지 않으면 코디네이터가 ERROR로 확정합니다.
    pub async fn cancel_scenario(&self, scenario_id: &str) -> Result<CancelOutcome, CoordinatorError> {
        let scenario = self
            .shared
            .repository
            .find_scenario(scenario_id)
            .await?
            .ok_or_else(|| CoordinatorError::ScenarioNotFound(scenario_id.to_owned()))?;

        let status = if scenario.status() == ScenarioStatus::Pending {
            if self.shared.repository.mark_scenario_skipped(scenario_id).await? {
                info!(scenario_id, "pending scenario skipped by cancellation");
                self.publish(scenario.test_plan_id(), scenario_id, ScenarioStatus::Pending)
                    .await;
                return Ok(CancelOutcome::Skipped);
            }
            // 이미 건너뜀 표시되었거나 그 사이에 디스패치됨
            self.shared
                .repository
                .find_scenario(scenario_id)
                .await?
                .map(|s| s.status())
                .unwrap_or(ScenarioStatus::Pending)
        } else {
            scenario.status()
        };

        match status {
            ScenarioStatus::Pending => Ok(CancelOutcome::Skipped),
            ScenarioStatus::Running => {
                self.request_cancel(scenario_id).await;
                Ok(CancelOutcome::Requested)
            }
            ScenarioStatus::Completed | ScenarioStatus::Error => Ok(CancelOutcome::AlreadyFinished),
        }
    }

    async fn request_cancel(&self, scenario_id: &str) {
        let token = self
            .shared
            .in_flight
            .lock()
            .await
            .get(scenario_id)
            .map(|f| f.token.clone());
        match token {
            Some(token) => {
                info!(scenario_id, "cancellation requested");
                token.cancel();
            }
            None => warn!(
                scenario_id,
                "running scenario has no local engine task, awaiting external acknowledgement"
            ),
        }

        if !self.shared.grace_timers.lock().await.insert(scenario_id.to_owned()) {
            debug!(scenario_id, "cancellation grace timer already armed");
            return;
        }

        let this = self.clone();
        let scenario_id = scenario_id.to_owned();
        let grace = self.shared.cancel_grace;
        self.shared.tracker.spawn(async move {
            let expired = tokio::select! {
                _ = tokio::time::sleep(grace) => true,
                _ = this.shared.root.cancelled() => false,
            };
            this.shared.grace_timers.lock().await.remove(&scenario_id);
            if !expired {
                debug!(scenario_id = scenario_id.as_str(), "grace timer stopped by shutdown");
                return;
            }
            match this.shared.repository.find_scenario(&scenario_id).await {
                Ok(Some(s)) if s.status() == ScenarioStatus::Running => {
                    warn!(
                        scenario_id = scenario_id.as_str(),
                        grace_secs = grace.as_secs(),
                        "engine did not acknowledge cancellation, forcing error"
                    );
                    this.settle(
                        &scenario_id,
                        EngineReport::cancelled("cancellation not acknowledged within grace period"),
                    )
                    .await;
                }
                Ok(_) => {}
                Err(e) => error!(scenario_id = scenario_id.as_str(), error = %e, "failed to check cancelled scenario"),
            }
        });
    }

    /// 플랜의 모든 활성 시나리오에 취소를 요청합니다.
    pub async fn cancel_plan(&self, plan_id: &str) -> Result<CancelSummary, CoordinatorError> {
        let plan = self
            .shared
            .repository
            .find_test_plan(plan_id)
            .await?
            .ok_or_else(|| CoordinatorError::PlanNotFound(plan_id.to_owned()))?;

        let mut summary = CancelSummary::default();
        for scenario in plan.scenarios().iter().filter(|s| s.is_enabled()) {
            match self.cancel_scenario(scenario.id()).await? {
                CancelOutcome::Skipped => summary.skipped += 1,
                CancelOutcome::Requested => summary.requested += 1,
                CancelOutcome::AlreadyFinished => summary.already_finished += 1,
            }
        }
        info!(
            plan_id,
            skipped = summary.skipped,
            requested = summary.requested,
            "plan cancellation requested"
        );
        Ok(summary)
    }

    /// 모든 실행 중 시나리오를 취소하고 작업이 끝날 때까지 최대 `timeout` 동안 기다립니다.
    ///
    /// 모든 작업이 끝났으면 `true`입니다.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        info!(in_flight = self.in_flight().await, "shutting down coordinator");
        self.shared.root.cancel();
        self.shared.tracker.close();
        match tokio::time::timeout(timeout, self.shared.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    remaining = self.shared.tracker.len(),
                    "coordinator tasks still running after shutdown timeout"
                );
                false
            }
        }
    }
}

/// 코디네이터 빌더
pub struct CoordinatorBuilder<R: Repository> {
    config: OrchestrationConfig,
    repository: Option<Arc<R>>,
    engines: HashMap<TestEngine, Arc<dyn DynEngineAdapter>>,
}

impl<R: Repository> Default for CoordinatorBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Repository> CoordinatorBuilder<R> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: OrchestrationConfig::default(),
            repository: None,
            engines: HashMap::new(),
        }
    }

    /// 코디네이터 설정을 지정합니다.
    pub fn config(mut self, config: OrchestrationConfig) -> Self {
        self.config = config;
        self
    }

    /// 저장소를 설정합니다.
    pub fn repository(mut self, repository: Arc<R>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// 엔진 어댑터를 등록합니다. 같은 엔진을 다시 등록하면 교체됩니다.
    pub fn engine(self, adapter: impl EngineAdapter) -> Self {
        self.engine_arc(Arc::new(adapter))
    }

    /// 이미 공유 중인 어댑터를 등록합니다.
    pub fn engine_arc(mut self, adapter: Arc<dyn DynEngineAdapter>) -> Self {
        self.engines.insert(adapter.engine(), adapter);
        self
    }

    /// 코디네이터를 빌드합니다.
    pub fn build(self) -> Result<Coordinator<R>, CoordinatorError> {
        self.config.validate()?;

        let repository = self.repository.ok_or_else(|| CoordinatorError::Config {
            field: "repository".to_owned(),
            reason: "repository must be provided".to_owned(),
        })?;

        let (events, _) = broadcast::channel(self.config.event_channel_capacity);

        Ok(Coordinator {
            shared: Arc::new(Shared {
                repository,
                engines: self.engines,
                permits: Arc::new(Semaphore::new(self.config.max_concurrent_scenarios)),
                events,
                in_flight: Mutex::new(HashMap::new()),
                grace_timers: Mutex::new(HashSet::new()),
                root: CancellationToken::new(),
                tracker: TaskTracker::new(),
                cancel_grace: self.config.cancel_grace(),
                scenarios_dispatched: AtomicU64::new(0),
                reports_accepted: AtomicU64::new(0),
                reports_stale: AtomicU64::new(0),
            }),
        })
    }
}
