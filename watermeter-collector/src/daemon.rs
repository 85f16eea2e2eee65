use std::{process::ExitCode, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    config::AppConfig,
    pipeline::{PipelineError, Sink, Source},
};

/// Cycle failures in a row after which the daemon gives up.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonOutcome {
    /// Stopped by a shutdown request.
    Graceful,
    /// Stopped after too many consecutive failures.
    Escalated,
}

impl DaemonOutcome {
    pub fn code(self) -> u8 {
        match self {
            Self::Graceful => 0,
            Self::Escalated => 1,
        }
    }

    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(self.code())
    }
}

#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub interval: Duration,
    /// Upper bound on the wait after a cycle that failed on the connection.
    pub retry_delay: Duration,
    pub max_consecutive_failures: u32,
}

impl DaemonSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            interval: cfg.collection_interval(),
            retry_delay: cfg.retry_delay(),
            max_consecutive_failures: MAX_CONSECUTIVE_FAILURES,
        }
    }
}

enum Cycle {
    Stored,
    Cancelled,
}

enum Step {
    Sleep(Duration),
    Stop(DaemonOutcome),
}

/// Poll loop state: the source, the sink that owns the connection, the
/// consecutive-failure counter and the shutdown token.
pub struct Daemon<S, K> {
    source: S,
    sink: K,
    settings: DaemonSettings,
    shutdown: CancellationToken,
    consecutive_failures: u32,
    state: DaemonState,
}

impl<S, K> Daemon<S, K>
where
    S: Source,
    K: Sink,
{
    pub fn new(source: S, sink: K, settings: DaemonSettings, shutdown: CancellationToken) -> Self {
        Self {
            source,
            sink,
            settings,
            shutdown,
            consecutive_failures: 0,
            state: DaemonState::Starting,
        }
    }

    pub fn state(&self) -> DaemonState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Run until shutdown is requested or the failure ceiling is reached. The
    /// sink is closed on every path out.
    pub async fn run(mut self) -> DaemonOutcome {
        self.set_state(DaemonState::Running);
        tracing::info!(
            interval_secs = self.settings.interval.as_secs_f64(),
            max_consecutive_failures = self.settings.max_consecutive_failures,
            "water meter daemon running"
        );

        let outcome = self.run_loop().await;

        self.set_state(DaemonState::ShuttingDown);
        self.sink.close().await;
        self.set_state(DaemonState::Stopped);
        tracing::info!(?outcome, "water meter daemon stopped");
        outcome
    }

    async fn run_loop(&mut self) -> DaemonOutcome {
        loop {
            let delay = match self.step().await {
                Step::Sleep(delay) => delay,
                Step::Stop(outcome) => return outcome,
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("shutdown requested while waiting for next cycle");
                    return DaemonOutcome::Graceful;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One loop iteration: run a cycle, update the counter, pick the next wait.
    async fn step(&mut self) -> Step {
        if self.shutdown.is_cancelled() {
            return Step::Stop(DaemonOutcome::Graceful);
        }

        match self.cycle().await {
            Ok(Cycle::Stored) => {
                self.consecutive_failures = 0;
                metrics::gauge!("daemon_consecutive_failures").set(0.0);
                Step::Sleep(self.settings.interval)
            }
            Ok(Cycle::Cancelled) => Step::Stop(DaemonOutcome::Graceful),
            Err(e) => {
                self.consecutive_failures += 1;
                metrics::counter!("meter_poll_failures_total", "kind" => e.kind()).increment(1);
                metrics::gauge!("daemon_consecutive_failures").set(f64::from(self.consecutive_failures));
                tracing::warn!(
                    kind = e.kind(),
                    error = %e,
                    consecutive_failures = self.consecutive_failures,
                    "poll cycle failed"
                );

                if self.consecutive_failures >= self.settings.max_consecutive_failures {
                    tracing::error!(
                        consecutive_failures = self.consecutive_failures,
                        "too many consecutive failures, shutting down"
                    );
                    return Step::Stop(DaemonOutcome::Escalated);
                }

                match e {
                    PipelineError::Connection(_) => {
                        Step::Sleep(self.settings.retry_delay.min(self.settings.interval))
                    }
                    _ => Step::Sleep(self.settings.interval),
                }
            }
        }
    }

    /// Health check, fetch, store. Each recovery (reconnect) is tried at most once,
    /// and a failing cycle yields exactly one error.
    async fn cycle(&mut self) -> Result<Cycle, PipelineError> {
        if !self.sink.health_check().await {
            tracing::warn!("database health check failed, attempting reconnection");
            self.sink.reconnect().await?;
        }

        if self.shutdown.is_cancelled() {
            return Ok(Cycle::Cancelled);
        }

        let reading = self.source.fetch().await?;

        match self.sink.write(&reading).await {
            Err(PipelineError::Connection(e)) => {
                tracing::warn!(error = %e, "database connection lost while storing, reconnecting");
                self.sink.reconnect().await?;
                self.sink.write(&reading).await?;
            }
            other => other?,
        }

        Ok(Cycle::Stored)
    }

    fn set_state(&mut self, state: DaemonState) {
        tracing::debug!(from = ?self.state, to = ?state, "daemon state change");
        self.state = state;
    }
}
