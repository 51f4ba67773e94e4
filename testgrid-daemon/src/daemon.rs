//! Daemon assembly and lifecycle.
//!
//! [`Daemon`] wires storage, engine adapters, the coordinator and the HTTP
//! API from a loaded [`TestGridConfig`], then serves until SIGTERM/SIGINT.
//!
//! # Shutdown Order
//!
//! 1. HTTP server stops accepting connections and drains in-flight requests
//! 2. Coordinator cancels running scenarios and waits up to `cancel_grace_secs`
//! 3. Background tasks stop, PID file is removed

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::Router;
use tokio::sync::broadcast;

use testgrid_coordinator::{
    Coordinator, CoordinatorBuilder, OrchestrationConfig, ProcessEngine, StatusEvent,
};
use testgrid_core::config::TestGridConfig;
use testgrid_core::metrics as m;
use testgrid_core::{FileRepository, MemoryRepository, Repository, TestEngine};

use crate::api::{self, AppState};
use crate::metrics_server;

/// Load storage for the configured backend and run the daemon until shutdown.
pub async fn run_from_config(config: TestGridConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }

    match config.storage.backend.as_str() {
        "memory" => {
            tracing::warn!("memory storage backend selected, state is lost on restart");
            Daemon::build(config, Arc::new(MemoryRepository::new()))?
                .run()
                .await
        }
        "file" => {
            let path = config.storage_path();
            let repo = FileRepository::open(&path).await.map_err(|e| {
                anyhow::anyhow!("failed to open storage {}: {}", path.display(), e)
            })?;
            Daemon::build(config, Arc::new(repo))?.run().await
        }
        other => Err(anyhow::anyhow!("unsupported storage backend '{}'", other)),
    }
}

/// The assembled daemon.
pub struct Daemon<R: Repository> {
    config: TestGridConfig,
    coordinator: Coordinator<R>,
    shutdown_tx: broadcast::Sender<()>,
    start_time: Instant,
}

impl<R: Repository> Daemon<R> {
    /// Build the coordinator with a process engine for every configured engine.
    pub fn build(config: TestGridConfig, repository: Arc<R>) -> Result<Self> {
        let mut builder = CoordinatorBuilder::new()
            .config(OrchestrationConfig::from_core(&config.coordinator))
            .repository(repository);

        for engine in TestEngine::ALL {
            match ProcessEngine::from_config(engine, config.engines.get(engine)) {
                Some(adapter) => {
                    tracing::info!(
                        engine = %engine,
                        command = adapter.command(),
                        "engine adapter registered"
                    );
                    builder = builder.engine(adapter);
                }
                None => {
                    tracing::warn!(
                        engine = %engine,
                        "engine not configured, scenarios for it cannot run"
                    );
                }
            }
        }

        let coordinator = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build coordinator: {}", e))?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            coordinator,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    pub fn coordinator(&self) -> &Coordinator<R> {
        &self.coordinator
    }

    pub fn config(&self) -> &TestGridConfig {
        &self.config
    }

    /// HTTP router for this daemon.
    pub fn router(&self) -> Router {
        api::router(AppState {
            started: self.start_time,
            ..AppState::new(self.coordinator.clone())
        })
    }

    /// Serve the API until a shutdown signal is received.
    pub async fn run(self) -> Result<()> {
        let pid_file = self.config.general.pid_file.clone();
        if !pid_file.is_empty() {
            write_pid_file(Path::new(&pid_file))?;
        }

        let result = self.serve().await;

        if !pid_file.is_empty() {
            remove_pid_file(Path::new(&pid_file));
        }
        result
    }

    async fn serve(&self) -> Result<()> {
        let addr: SocketAddr = format!(
            "{}:{}",
            self.config.server.listen_addr, self.config.server.port
        )
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid server listen address: {}", e))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", addr, e))?;

        let event_logger =
            spawn_event_logger(self.coordinator.subscribe(), self.shutdown_tx.subscribe());
        let uptime_updater = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        tracing::info!(listen_addr = %addr, "testgrid-daemon listening");

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                match wait_for_shutdown_signal().await {
                    Ok(signal) => tracing::info!(signal, "shutdown signal received"),
                    Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
                }
            })
            .await;

        let grace = Duration::from_secs(self.config.coordinator.cancel_grace_secs);
        if !self.coordinator.shutdown(grace).await {
            tracing::warn!("some scenarios did not settle before shutdown");
        }

        let _ = self.shutdown_tx.send(());
        let _ = event_logger.await;
        if let Some(task) = uptime_updater {
            let _ = task.await;
        }

        served.map_err(|e| anyhow::anyhow!("http server failed: {}", e))?;
        tracing::info!("testgrid-daemon shut down");
        Ok(())
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Write the current process PID to a file.
///
/// Fails if the file already exists, so two daemons cannot share one PID file.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing_pid = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing_pid.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;
    tracing::info!(pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file. Failure is logged, not returned.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Log every scenario/plan status transition published by the coordinator.
fn spawn_event_logger(
    mut events: broadcast::Receiver<StatusEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => tracing::info!(
                        plan_id = %event.plan_id,
                        scenario_id = %event.scenario_id,
                        scenario_status = %event.scenario_status,
                        plan_status = %event.plan_status,
                        "status changed"
                    ),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "status event logger lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown_rx.recv() => break,
            }
        }
        tracing::debug!("status event logger stopped");
    })
}

/// Periodically publish the daemon uptime gauge.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(15));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    })
}
