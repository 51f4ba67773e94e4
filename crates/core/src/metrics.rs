//! 메트릭 상수
//!
//! 모든 Prometheus 메트릭의 이름을 중앙에서 정의합니다.
//! 각 모듈은 이 상수로 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `testgrid_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 테스트 엔진 레이블 키 (JMETER, TESTNG, SELENIUM)
pub const LABEL_ENGINE: &str = "engine";

/// 종료 상태 레이블 키 (COMPLETED, ERROR)
pub const LABEL_STATUS: &str = "status";

/// HTTP 경로 레이블 키
pub const LABEL_ROUTE: &str = "route";

/// HTTP 상태 코드 레이블 키
pub const LABEL_HTTP_STATUS: &str = "http_status";

// ─── 등록 ───────────────────────────────────────────────────────────

/// 새로 저장된 제품 수 (counter)
pub const PRODUCTS_REGISTERED_TOTAL: &str = "testgrid_products_registered_total";

/// 동시 등록 충돌을 기존 레코드로 복구한 횟수 (counter)
pub const PRODUCTS_DUPLICATE_RECOVERED_TOTAL: &str = "testgrid_products_duplicate_recovered_total";

// ─── 오케스트레이션 ─────────────────────────────────────────────────

/// 엔진으로 디스패치된 시나리오 수 (counter, label: engine)
pub const SCENARIOS_DISPATCHED_TOTAL: &str = "testgrid_scenarios_dispatched_total";

/// 수락된 종료 보고 수 (counter, label: status)
pub const REPORTS_ACCEPTED_TOTAL: &str = "testgrid_reports_accepted_total";

/// 이미 종료된 시나리오에 대한 보고 수 (counter)
pub const REPORTS_STALE_TOTAL: &str = "testgrid_reports_stale_total";

/// 실행 중인 시나리오 수 (gauge)
pub const SCENARIOS_IN_FLIGHT: &str = "testgrid_scenarios_in_flight";

/// 디스패치부터 종료까지 걸린 시간 (histogram, 초, label: engine)
pub const SCENARIO_DURATION_SECONDS: &str = "testgrid_scenario_duration_seconds";

// ─── API ────────────────────────────────────────────────────────────

/// 처리된 HTTP 요청 수 (counter, labels: route, http_status)
pub const API_REQUESTS_TOTAL: &str = "testgrid_api_requests_total";

// ─── 데몬 ───────────────────────────────────────────────────────────

/// 빌드 정보 (gauge, label: version)
pub const DAEMON_BUILD_INFO: &str = "testgrid_daemon_build_info";

/// 데몬 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "testgrid_daemon_uptime_seconds";

/// 메트릭 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_metrics() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(PRODUCTS_REGISTERED_TOTAL, "Products persisted by registration");
    describe_counter!(
        PRODUCTS_DUPLICATE_RECOVERED_TOTAL,
        "Concurrent duplicate registrations recovered as existing products"
    );
    describe_counter!(SCENARIOS_DISPATCHED_TOTAL, "Scenarios dispatched to a test engine");
    describe_counter!(REPORTS_ACCEPTED_TOTAL, "Terminal engine reports accepted");
    describe_counter!(REPORTS_STALE_TOTAL, "Engine reports dropped as stale");
    describe_gauge!(SCENARIOS_IN_FLIGHT, "Scenarios currently running");
    describe_histogram!(
        SCENARIO_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Time from dispatch to terminal status"
    );
    describe_counter!(API_REQUESTS_TOTAL, "HTTP requests served by the query API");
    describe_gauge!(DAEMON_BUILD_INFO, "Daemon build information");
    describe_gauge!(DAEMON_UPTIME_SECONDS, metrics::Unit::Seconds, "Daemon uptime");
}
