//! Client repeat sequences
//!
//! A [`RunController`] executes up to `repeat_count` sequential client runs
//! with a pause of `repeat_interval` between them. A [`ShutdownSignal`]
//! stops the sequence: it cancels the run in flight, interrupts the pause,
//! and prevents any further run from starting.

use crate::{
    error::{AppError, Result},
    logging::Logger,
    models::Config,
    process::{ProcessHandle, ProcessSupervisor, RunOutcome},
    resources::ResourceMonitor,
    status::StatusReporter,
    types::Role,
};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Cooperative stop request shared between a sequence and its callers
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn request(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn clear(&self) {
        self.tx.send_replace(false);
    }

    /// Resolves once a stop has been requested
    pub async fn requested(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// State of one repeat sequence
#[derive(Debug)]
pub struct RunSession {
    index: u32,
    repeat_count: u32,
    repeat_interval: Duration,
    shutdown: ShutdownSignal,
    current: Option<ProcessHandle>,
}

impl RunSession {
    pub fn new(repeat_count: u32, repeat_interval: Duration, shutdown: ShutdownSignal) -> Self {
        Self {
            index: 0,
            repeat_count: repeat_count.max(1),
            repeat_interval,
            shutdown,
            current: None,
        }
    }

    /// Zero-based index of the next or current run
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    pub fn repeat_interval(&self) -> Duration {
        self.repeat_interval
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.is_requested()
    }

    pub fn current(&self) -> Option<&ProcessHandle> {
        self.current.as_ref()
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.repeat_count
    }

    fn advance(&mut self) {
        self.current = None;
        self.index += 1;
    }
}

/// What a repeat sequence did
#[derive(Debug, Default)]
pub struct SessionSummary {
    pub planned_runs: u32,
    pub started_runs: u32,
    pub successful_runs: u32,
    /// Runs that ended with a non-zero exit or an unreadable report
    pub failed_runs: u32,
    /// The sequence was stopped by a shutdown request
    pub cancelled: bool,
    pub total_duration: Duration,
    pub outcomes: Vec<Arc<RunOutcome>>,
    /// Why the sequence stopped before starting a run
    pub start_error: Option<AppError>,
}

impl SessionSummary {
    fn record(&mut self, outcome: Arc<RunOutcome>) {
        if outcome.succeeded() {
            self.successful_runs += 1;
        } else if outcome.error().is_some() {
            self.failed_runs += 1;
        }
        self.outcomes.push(outcome);
    }

    /// Share of started runs that succeeded, in percent
    pub fn success_rate(&self) -> f64 {
        if self.started_runs == 0 {
            0.0
        } else {
            (self.successful_runs as f64 / self.started_runs as f64) * 100.0
        }
    }

    pub fn average_sent_bits_per_second(&self) -> Option<f64> {
        average(self.outcomes.iter().filter_map(|o| o.result()).map(|r| r.sent_bits_per_second()))
    }

    pub fn average_received_bits_per_second(&self) -> Option<f64> {
        average(self.outcomes.iter().filter_map(|o| o.result()).map(|r| r.received_bits_per_second()))
    }

    pub fn artifacts(&self) -> Vec<&Path> {
        self.outcomes.iter().flat_map(|o| o.artifacts()).collect()
    }

    /// True when every planned run started and succeeded
    pub fn is_complete_success(&self) -> bool {
        self.start_error.is_none() && !self.cancelled && self.successful_runs == self.planned_runs
    }
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Drives client repeat sequences, one at a time
pub struct RunController {
    supervisor: Arc<ProcessSupervisor>,
    reporter: Arc<dyn StatusReporter>,
    resources: Option<ResourceMonitor>,
    logger: Logger,
    shutdown: ShutdownSignal,
    running: watch::Sender<bool>,
}

/// Clears the running indicator and the shutdown flag however the loop ends
struct ActiveSequence<'a> {
    controller: &'a RunController,
}

impl Drop for ActiveSequence<'_> {
    fn drop(&mut self) {
        self.controller.running.send_replace(false);
        self.controller.shutdown.clear();
    }
}

impl RunController {
    pub fn new(supervisor: Arc<ProcessSupervisor>, reporter: Arc<dyn StatusReporter>, logger: Logger) -> Self {
        let (running, _rx) = watch::channel(false);
        Self {
            supervisor,
            reporter,
            resources: None,
            logger,
            shutdown: ShutdownSignal::new(),
            running,
        }
    }

    /// Report host load while each run is active
    pub fn with_resource_monitor(mut self, monitor: ResourceMonitor) -> Self {
        self.resources = Some(monitor);
        self
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Whether a repeat sequence is in progress
    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    /// Resolves once no repeat sequence is in progress
    pub async fn wait_idle(&self) {
        let mut rx = self.running.subscribe();
        let _ = rx.wait_for(|running| !*running).await;
    }

    /// Stop the active sequence and wait for it to wind down.
    ///
    /// Does nothing when no sequence is running, so a stale request can
    /// never cancel the next sequence.
    pub async fn shutdown(&self) {
        if !self.is_running() {
            return;
        }

        self.shutdown.request();
        self.supervisor.shutdown(Role::Client).await;
        self.wait_idle().await;
    }

    /// Run the client repeat sequence described by `config`.
    ///
    /// Fails only when a sequence is already running. Everything that goes
    /// wrong during the sequence is recorded in the returned summary.
    pub async fn run(&self, config: &Config) -> Result<SessionSummary> {
        if self.running.send_replace(true) {
            return Err(AppError::already_running("A client repeat sequence is already in progress"));
        }
        let _active = ActiveSequence { controller: self };

        let client = &config.client;
        let mut session = RunSession::new(client.repeat_count, client.repeat_interval(), self.shutdown.clone());
        let mut summary = SessionSummary {
            planned_runs: session.repeat_count(),
            ..SessionSummary::default()
        };

        let correlation_id = self.logger.start_operation("client repeat sequence").await;
        let started_at = Instant::now();

        loop {
            if session.shutdown_requested() {
                summary.cancelled = true;
                break;
            }

            self.reporter
                .iteration_started(session.index() + 1, session.repeat_count())
                .await;

            let handle = match self.supervisor.start_with_config(config, Role::Client, session.index()).await {
                Ok(handle) => handle,
                Err(e) => {
                    self.reporter.warning(&e.to_string()).await;
                    summary.start_error = Some(e);
                    break;
                }
            };
            summary.started_runs += 1;
            session.current = Some(handle.clone());
            let usage = self.resources.as_ref().map(|monitor| monitor.spawn(handle.clone()));

            let outcome = self.await_run(&handle).await;
            if let Some(task) = usage {
                // Ends on its own once the exit is delivered
                let _ = task.await;
            }
            let outcome = outcome?;
            self.reporter.run_finished(&outcome).await;
            summary.record(outcome);

            if session.is_last() {
                break;
            }
            if session.shutdown_requested() {
                summary.cancelled = true;
                break;
            }

            session.advance();
            self.pause(session.repeat_interval()).await;
        }

        summary.total_duration = started_at.elapsed();
        self.logger
            .info(&format!(
                "Repeat sequence finished: {}/{} runs started, {} successful",
                summary.started_runs, summary.planned_runs, summary.successful_runs
            ))
            .correlation_id(&correlation_id)
            .field("cancelled", summary.cancelled)
            .field("failed_runs", summary.failed_runs)
            .log()
            .await;
        self.logger
            .end_operation(&correlation_id, "client repeat sequence", summary.start_error.is_none())
            .await;

        self.reporter.session_finished(&summary).await;
        Ok(summary)
    }

    /// Wait for a run to finish, cancelling it if a stop is requested first
    async fn await_run(&self, handle: &ProcessHandle) -> Result<Arc<RunOutcome>> {
        tokio::select! {
            outcome = handle.wait() => outcome,
            _ = self.shutdown.requested() => {
                handle.shutdown().await;
                handle.wait().await
            }
        }
    }

    async fn pause(&self, interval: Duration) {
        if interval.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = self.shutdown.requested() => {}
        }
    }
}
