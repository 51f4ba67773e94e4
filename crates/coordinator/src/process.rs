//! 외부 프로세스 엔진 어댑터
//!
//! 엔진별로 설정된 명령을 시나리오마다 한 번 실행합니다.
//!
//! - 환경변수: `TESTGRID_PLAN_ID`, `TESTGRID_SCENARIO_ID`, `TESTGRID_SCENARIO_NAME`
//! - 종료 코드 0 → `success`, 0이 아님 → `failure`
//! - 타임아웃, 실행 실패 → `error`
//! - 취소 → 프로세스를 종료하고 `cancelled`
//! - stdout의 JSON 줄 `{"name", "result", "message"}`은 테스트 케이스로 기록됩니다.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use testgrid_core::config::EngineConfig;
use testgrid_core::types::{TestCaseReport, TestEngine};

use crate::engine::{Dispatch, EngineAdapter, EngineError, EngineReport, ScenarioJob};

/// 프로세스 기반 엔진 어댑터
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    engine: TestEngine,
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessEngine {
    pub fn new(engine: TestEngine, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            engine,
            command: command.into(),
            args,
            timeout: Duration::from_secs(3600),
        }
    }

    /// 엔진 설정에서 어댑터를 만듭니다. 명령이 비어 있으면 `None`입니다.
    pub fn from_config(engine: TestEngine, config: &EngineConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        Some(
            Self::new(engine, config.command.trim(), config.args.clone())
                .with_timeout(Duration::from_secs(config.timeout_secs)),
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

/// 프로세스 종료 후 stdout을 마저 읽는 최대 시간
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 프로세스 대기 결과
enum Exit {
    Status(std::process::ExitStatus),
    TimedOut,
    Cancelled,
}

impl EngineAdapter for ProcessEngine {
    fn engine(&self) -> TestEngine {
        self.engine
    }

    async fn execute(&self, job: ScenarioJob) -> Result<Dispatch, EngineError> {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .env("TESTGRID_PLAN_ID", &job.plan_id)
            .env("TESTGRID_SCENARIO_ID", &job.scenario_id)
            .env("TESTGRID_SCENARIO_NAME", &job.name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(
                    engine = %self.engine,
                    command = self.command.as_str(),
                    error = %e,
                    "failed to spawn engine process"
                );
                return Ok(Dispatch::Finished(EngineReport::error(
                    EngineError::Launch(format!("{}: {e}", self.command)).to_string(),
                )));
            }
        };

        info!(
            engine = %self.engine,
            scenario_id = job.scenario_id.as_str(),
            pid = child.id(),
            "engine process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Protocol("engine stdout not captured".to_owned()))?;
        let mut reader = tokio::spawn(collect_cases(BufReader::new(stdout)));

        let exit = tokio::select! {
            status = child.wait() => Exit::Status(status?),
            _ = tokio::time::sleep(self.timeout) => Exit::TimedOut,
            _ = job.cancel.cancelled() => Exit::Cancelled,
        };

        if !matches!(exit, Exit::Status(_)) {
            if let Err(e) = child.kill().await {
                warn!(scenario_id = job.scenario_id.as_str(), error = %e, "failed to kill engine process");
            }
        }

        // 손자 프로세스가 stdout을 잡고 있으면 EOF가 오지 않음
        let cases = match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut reader).await {
            Ok(Ok(cases)) => cases,
            Ok(Err(e)) => {
                warn!(error = %e, "engine output reader failed");
                Vec::new()
            }
            Err(_) => {
                reader.abort();
                warn!(
                    scenario_id = job.scenario_id.as_str(),
                    "engine output still open after exit, dropping remaining lines"
                );
                Vec::new()
            }
        };

        let report = match exit {
            Exit::Status(status) if status.success() => EngineReport::success(cases),
            Exit::Status(status) => {
                let reason = match status.code() {
                    Some(code) => format!("engine exited with status {code}"),
                    None => "engine terminated by signal".to_owned(),
                };
                EngineReport::failure(cases, reason)
            }
            Exit::TimedOut => EngineReport::error(format!(
                "engine timed out after {}s",
                self.timeout.as_secs()
            ))
            .with_cases(cases),
            Exit::Cancelled => EngineReport::cancelled("cancelled by request").with_cases(cases),
        };

        debug!(
            scenario_id = job.scenario_id.as_str(),
            kind = report.kind.as_str(),
            cases = report.cases.len(),
            "engine process finished"
        );
        Ok(Dispatch::Finished(report))
    }
}

/// 시나리오 실행 하나에서 받아들이는 최대 테스트 케이스 수
const MAX_REPORTED_CASES: usize = 10_000;
/// 엔진 출력 한 줄의 최대 길이. 넘는 줄은 버려짐
const MAX_LINE_BYTES: u64 = 64 * 1024;

enum Line {
    Complete,
    Overlong,
    Eof,
}

/// 엔진 stdout을 끝까지 읽습니다. 한도를 넘은 출력은 버리되 파이프는 계속 비웁니다.
async fn collect_cases<R>(mut reader: BufReader<R>) -> Vec<TestCaseReport>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut cases = Vec::new();
    let mut buf = Vec::new();
    let mut overlong = 0usize;
    let mut dropped = 0usize;
    loop {
        buf.clear();
        match read_bounded_line(&mut reader, &mut buf).await {
            Ok(Line::Eof) => break,
            Ok(Line::Overlong) => overlong += 1,
            Ok(Line::Complete) => {
                let Some(case) = std::str::from_utf8(&buf).ok().and_then(parse_case_line) else {
                    continue;
                };
                if cases.len() < MAX_REPORTED_CASES {
                    cases.push(case);
                } else {
                    dropped += 1;
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to read engine output");
                break;
            }
        }
    }

    if overlong > 0 {
        warn!(
            lines = overlong,
            max_line_bytes = MAX_LINE_BYTES,
            "discarded over-long engine output lines"
        );
    }
    if dropped > 0 {
        warn!(
            dropped,
            max_cases = MAX_REPORTED_CASES,
            "engine reported more test cases than accepted, extra cases dropped"
        );
    }
    cases
}

/// 한 줄을 `buf`에 읽습니다. 한도를 넘으면 줄의 나머지를 버리고 `Overlong`을 돌려줍니다.
async fn read_bounded_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    let n = (&mut *reader)
        .take(MAX_LINE_BYTES + 1)
        .read_until(b'\n', buf)
        .await?;
    if n == 0 {
        return Ok(Line::Eof);
    }
    if buf.last() == Some(&b'\n') || buf.len() as u64 <= MAX_LINE_BYTES {
        return Ok(Line::Complete);
    }

    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            break;
        }
        match chunk.iter().position(|&b| b == b'\n') {
            Some(i) => {
                reader.consume(i + 1);
                break;
            }
            None => {
                let len = chunk.len();
                reader.consume(len);
            }
        }
    }
    Ok(Line::Overlong)
}

/// JSON 테스트 케이스 줄만 골라냅니다. 그 밖의 출력은 무시합니다.
fn parse_case_line(line: &str) -> Option<TestCaseReport> {
    let line = line.trim();
    if !line.starts_with('{') {
        return None;
    }
    serde_json::from_str(line).ok()
}
