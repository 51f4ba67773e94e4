//! HTTP JSON API.
//!
//! # Routes
//!
//! | Method | Path                                   | Success |
//! |--------|----------------------------------------|---------|
//! | GET    | `/health`                              | 200     |
//! | GET    | `/test-cases?test-scenario-id=<id>`    | 200     |
//! | GET    | `/test-cases/{id}`                     | 200     |
//! | GET    | `/test-plans/{id}`                     | 200     |
//! | GET    | `/test-plans/{id}/test-scenarios`      | 200     |
//! | POST   | `/test-plans/{id}/run`                 | 202     |
//! | POST   | `/test-plans/{id}/cancel`              | 202     |
//! | POST   | `/test-scenarios/{id}/report`          | 200     |
//! | POST   | `/test-scenarios/{id}/cancel`          | 202     |
//!
//! Error bodies are `{"message": "..."}`. Infrastructure failures are logged
//! with full detail and answered with a generic message only.

use std::time::Instant;

use axum::extract::{MatchedPath, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use testgrid_coordinator::{CancelOutcome, Coordinator, CoordinatorError, EngineReport};
use testgrid_core::error::QueryError;
use testgrid_core::metrics as m;
use testgrid_core::{QueryService, Repository, TestCase, TestPlanView, TestScenarioView};

/// Shared handler state.
pub struct AppState<R: Repository> {
    pub query: QueryService<R>,
    pub coordinator: Coordinator<R>,
    pub started: Instant,
}

impl<R: Repository> AppState<R> {
    pub fn new(coordinator: Coordinator<R>) -> Self {
        Self {
            query: QueryService::new(std::sync::Arc::clone(coordinator.repository())),
            coordinator,
            started: Instant::now(),
        }
    }
}

impl<R: Repository> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            coordinator: self.coordinator.clone(),
            started: self.started,
        }
    }
}

/// Build the API router.
pub fn router<R: Repository>(state: AppState<R>) -> Router {
    Router::new()
        .route("/health", get(health::<R>))
        .route("/test-cases", get(list_test_cases::<R>))
        .route("/test-cases/:id", get(get_test_case::<R>))
        .route("/test-plans/:id", get(get_test_plan::<R>))
        .route("/test-plans/:id/test-scenarios", get(list_test_scenarios::<R>))
        .route("/test-plans/:id/run", post(run_test_plan::<R>))
        .route("/test-plans/:id/cancel", post(cancel_test_plan::<R>))
        .route("/test-scenarios/:id/report", post(report_test_scenario::<R>))
        .route("/test-scenarios/:id/cancel", post(cancel_test_scenario::<R>))
        .route_layer(middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Errors ─────────────────────────────────────────────────────────

/// API error response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Unavailable(String),

    /// `public` goes to the client, `detail` only to the log.
    #[error("{public}")]
    Internal { public: String, detail: String },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ApiError {
    /// Map a query failure. `generic` is the client message for infrastructure failures.
    fn from_query(err: QueryError, generic: impl FnOnce() -> String) -> Self {
        match err {
            QueryError::NotFound { .. } => Self::NotFound(err.to_string()),
            QueryError::Infrastructure(e) => Self::Internal {
                public: generic(),
                detail: e.to_string(),
            },
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::PlanNotFound(id) => Self::NotFound(not_found("TestPlan", &id)),
            CoordinatorError::ScenarioNotFound(id) => {
                Self::NotFound(not_found("TestScenario", &id))
            }
            e @ CoordinatorError::InvalidStateTransition { .. } => Self::Conflict(e.to_string()),
            e @ CoordinatorError::EngineUnavailable(_) => Self::Unprocessable(e.to_string()),
            e @ CoordinatorError::ShuttingDown => Self::Unavailable(e.to_string()),
            e @ (CoordinatorError::Config { .. } | CoordinatorError::Storage(_)) => {
                Self::Internal {
                    public: "Error occurred while processing the request.".to_owned(),
                    detail: e.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal { public, detail } = &self {
            error!(status = status.as_u16(), message = public.as_str(), detail = detail.as_str(), "request failed");
        }
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn not_found(entity: &'static str, id: &str) -> String {
    QueryError::NotFound {
        entity,
        id: id.to_owned(),
    }
    .to_string()
}

// ─── Handlers ───────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub uptime_secs: u64,
    pub in_flight: usize,
    pub engines: Vec<String>,
    pub scenarios_dispatched: u64,
    pub reports_accepted: u64,
    pub reports_stale: u64,
}

async fn health<R: Repository>(State(state): State<AppState<R>>) -> Json<HealthReport> {
    let coordinator = &state.coordinator;
    let uptime_secs = state.started.elapsed().as_secs();
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);

    let mut engines: Vec<String> = coordinator
        .registered_engines()
        .into_iter()
        .map(|e| e.as_str().to_owned())
        .collect();
    engines.sort();

    Json(HealthReport {
        status: if coordinator.is_shutting_down() {
            "shutting_down".to_owned()
        } else {
            "ok".to_owned()
        },
        uptime_secs,
        in_flight: coordinator.in_flight().await,
        engines,
        scenarios_dispatched: coordinator.scenarios_dispatched(),
        reports_accepted: coordinator.reports_accepted(),
        reports_stale: coordinator.reports_stale(),
    })
}

#[derive(Debug, Deserialize)]
pub struct TestCasesQuery {
    #[serde(rename = "test-scenario-id")]
    pub test_scenario_id: Option<String>,
}

async fn list_test_cases<R: Repository>(
    State(state): State<AppState<R>>,
    Query(params): Query<TestCasesQuery>,
) -> Result<Json<Vec<TestCase>>, ApiError> {
    let scenario_id = params.test_scenario_id.ok_or_else(|| {
        ApiError::BadRequest("query parameter 'test-scenario-id' is required".to_owned())
    })?;
    let cases = state
        .query
        .test_cases_for_scenario(&scenario_id)
        .await
        .map_err(|e| {
            ApiError::from_query(e, || "Error occurred while fetching the TestCases.".to_owned())
        })?;
    Ok(Json(cases))
}

async fn get_test_case<R: Repository>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<Json<TestCase>, ApiError> {
    let case = state.query.test_case(&id).await.map_err(|e| {
        ApiError::from_query(e, || {
            format!("Error occurred while fetching the TestCase by id : '{id}'")
        })
    })?;
    Ok(Json(case))
}

async fn get_test_plan<R: Repository>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<Json<TestPlanView>, ApiError> {
    let plan = state.query.test_plan(&id).await.map_err(|e| {
        ApiError::from_query(e, || {
            format!("Error occurred while fetching the TestPlan by id : '{id}'")
        })
    })?;
    Ok(Json(TestPlanView::from(&plan)))
}

async fn list_test_scenarios<R: Repository>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TestScenarioView>>, ApiError> {
    let scenarios = state.query.test_scenarios_for_plan(&id).await.map_err(|e| {
        ApiError::from_query(e, || "Error occurred while fetching the TestScenarios.".to_owned())
    })?;
    Ok(Json(scenarios.iter().map(TestScenarioView::from).collect()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub plan_id: String,
    pub dispatched: Vec<String>,
    pub not_dispatched: usize,
}

async fn run_test_plan<R: Repository>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<RunResponse>), ApiError> {
    let run = state.coordinator.run_plan(&id).await?;
    info!(plan_id = %run.plan_id, dispatched = run.dispatched.len(), "plan run accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(RunResponse {
            plan_id: run.plan_id,
            dispatched: run.dispatched,
            not_dispatched: run.not_dispatched,
        }),
    ))
}

async fn cancel_test_plan<R: Repository>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<testgrid_coordinator::CancelSummary>), ApiError> {
    let summary = state.coordinator.cancel_plan(&id).await?;
    Ok((StatusCode::ACCEPTED, Json(summary)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse {
    /// `accepted` or `stale`
    pub outcome: String,
    pub status: testgrid_core::ScenarioStatus,
}

async fn report_test_scenario<R: Repository>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(report): Json<EngineReport>,
) -> Result<Json<ReportResponse>, ApiError> {
    let outcome = state.coordinator.report(&id, report).await?;
    Ok(Json(ReportResponse {
        outcome: outcome.as_str().to_owned(),
        status: outcome.status(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    /// `skipped`, `requested` or `already_finished`
    pub outcome: String,
}

async fn cancel_test_scenario<R: Repository>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<CancelResponse>), ApiError> {
    let outcome = match state.coordinator.cancel_scenario(&id).await? {
        CancelOutcome::Skipped => "skipped",
        CancelOutcome::Requested => "requested",
        CancelOutcome::AlreadyFinished => "already_finished",
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(CancelResponse {
            outcome: outcome.to_owned(),
        }),
    ))
}

/// Count handled requests by matched route and status.
async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let response = next.run(request).await;
    metrics::counter!(
        m::API_REQUESTS_TOTAL,
        m::LABEL_ROUTE => route,
        m::LABEL_HTTP_STATUS => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use testgrid_core::error::StorageError;

    #[test]
    fn infrastructure_detail_is_not_exposed() {
        let err = ApiError::from_query(
            QueryError::Infrastructure(StorageError::Serialization("disk full".to_owned())),
            || "Error occurred while fetching the TestCases.".to_owned(),
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Error occurred while fetching the TestCases.");
    }

    #[test]
    fn coordinator_errors_map_to_status_codes() {
        let cases = [
            (CoordinatorError::PlanNotFound("p".to_owned()), StatusCode::NOT_FOUND),
            (
                CoordinatorError::ScenarioNotFound("s".to_owned()),
                StatusCode::NOT_FOUND,
            ),
            (
                CoordinatorError::InvalidStateTransition {
                    scenario_id: "s".to_owned(),
                    from: testgrid_core::ScenarioStatus::Pending,
                    to: testgrid_core::ScenarioStatus::Completed,
                },
                StatusCode::CONFLICT,
            ),
            (
                CoordinatorError::EngineUnavailable(testgrid_core::TestEngine::Jmeter),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (CoordinatorError::ShuttingDown, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn scenario_not_found_uses_lookup_template() {
        let err = ApiError::from(CoordinatorError::ScenarioNotFound("abc".to_owned()));
        assert_eq!(
            err.to_string(),
            "Unable to find the requested TestScenario by id : 'abc'"
        );
    }
}
