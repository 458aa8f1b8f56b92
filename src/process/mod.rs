//! Supervision of iperf3 subprocesses
//!
//! A [`ProcessHandle`] moves through `Running → Reducing → Finished`. The
//! step out of `Running` happens exactly once, when the exit code arrives
//! from the task that waits on the child. The same task then reduces the
//! captured output before publishing the final [`RunOutcome`].

pub mod capture;
pub mod supervisor;

pub use capture::{CapturedOutput, OutputCapture, StreamCapture};
pub use supervisor::ProcessSupervisor;

use crate::defaults::SHUTDOWN_GRACE;
use crate::error::{AppError, Result};
use crate::logging::ProcessLogger;
use crate::models::MeasurementResult;
use crate::report::ReadOutcome;
use crate::types::Role;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Exit code reported when the OS gives neither a code nor a signal
pub const ABNORMAL_EXIT_CODE: i32 = -1;

const NO_REPORT: &ReadOutcome = &ReadOutcome::Empty;

/// Lifecycle of one process invocation
#[derive(Debug, Clone)]
pub enum RunState {
    Running,
    /// Exited; captured output is being reduced
    Reducing { exit_code: i32 },
    Finished(Arc<RunOutcome>),
}

/// Everything known about a run once it is over
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub role: Role,
    pub run_index: u32,
    pub exit_code: i32,
    /// Termination was requested through the handle
    pub cancelled: bool,
    pub duration: Duration,
    /// One entry per document the tool printed, never empty
    pub reports: Vec<ReadOutcome>,
    /// Text the tool wrote to stderr
    pub diagnostics: String,
    /// Set when the sinks could not be read back
    pub capture_error: Option<String>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.cancelled && self.capture_error.is_none()
    }

    /// The first report, or `Empty` when nothing was read
    pub fn report(&self) -> &ReadOutcome {
        self.reports.first().unwrap_or(NO_REPORT)
    }

    pub fn result(&self) -> Option<&MeasurementResult> {
        self.report().result()
    }

    pub fn results(&self) -> impl Iterator<Item = &MeasurementResult> {
        self.reports.iter().filter_map(ReadOutcome::result)
    }

    pub fn artifact(&self) -> Option<&Path> {
        self.report().artifact()
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &Path> {
        self.reports.iter().filter_map(ReadOutcome::artifact)
    }

    /// The failure to surface for this run, if any. Cancellation is not one.
    pub fn error(&self) -> Option<AppError> {
        if let Some(reason) = &self.capture_error {
            return Some(AppError::capture(reason.clone()));
        }
        if self.cancelled {
            return None;
        }
        if self.exit_code != 0 {
            return Some(AppError::unexpected_exit(self.exit_code));
        }
        self.reports.iter().find_map(|report| match report {
            ReadOutcome::Malformed { reason } | ReadOutcome::Undecodable { reason, .. } => {
                Some(AppError::malformed_output(reason.clone()))
            }
            _ => None,
        })
    }
}

#[derive(Debug)]
struct HandleInner {
    role: Role,
    run_index: u32,
    pid: Option<u32>,
    correlation_id: String,
    started_at: Instant,
    state: watch::Receiver<RunState>,
    cancel: watch::Sender<bool>,
    logger: ProcessLogger,
}

/// Shared view of one running or finished process
///
/// Cloning is cheap; all clones observe the same run.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    inner: Arc<HandleInner>,
}

impl ProcessHandle {
    pub(crate) fn new(
        role: Role,
        run_index: u32,
        pid: Option<u32>,
        correlation_id: String,
        state: watch::Receiver<RunState>,
        cancel: watch::Sender<bool>,
        logger: ProcessLogger,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                role,
                run_index,
                pid,
                correlation_id,
                started_at: Instant::now(),
                state,
                cancel,
                logger,
            }),
        }
    }

    pub fn role(&self) -> Role {
        self.inner.role
    }

    pub fn run_index(&self) -> u32 {
        self.inner.run_index
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    pub fn correlation_id(&self) -> &str {
        &self.inner.correlation_id
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    pub fn state(&self) -> RunState {
        self.inner.state.borrow().clone()
    }

    /// True until the exit code has been delivered
    pub fn is_running(&self) -> bool {
        matches!(*self.inner.state.borrow(), RunState::Running)
    }

    pub fn is_finished(&self) -> bool {
        matches!(*self.inner.state.borrow(), RunState::Finished(_))
    }

    pub fn exit_code(&self) -> Option<i32> {
        match &*self.inner.state.borrow() {
            RunState::Running => None,
            RunState::Reducing { exit_code } => Some(*exit_code),
            RunState::Finished(outcome) => Some(outcome.exit_code),
        }
    }

    pub fn outcome(&self) -> Option<Arc<RunOutcome>> {
        match &*self.inner.state.borrow() {
            RunState::Finished(outcome) => Some(Arc::clone(outcome)),
            _ => None,
        }
    }

    pub fn cancel_requested(&self) -> bool {
        *self.inner.cancel.borrow()
    }

    /// Wait until the process has exited, without waiting for reduction
    pub async fn wait_exited(&self) -> Result<i32> {
        let mut state = self.inner.state.clone();
        let code = state
            .wait_for(|s| !matches!(s, RunState::Running))
            .await
            .map_err(|_| AppError::internal("Exit monitor stopped before delivering an exit code"))?
            .clone();

        match code {
            RunState::Reducing { exit_code } => Ok(exit_code),
            RunState::Finished(outcome) => Ok(outcome.exit_code),
            RunState::Running => Err(AppError::internal("Process still running")),
        }
    }

    /// Wait until the run has exited and its output has been reduced
    pub async fn wait(&self) -> Result<Arc<RunOutcome>> {
        let mut state = self.inner.state.clone();
        let finished = state
            .wait_for(|s| matches!(s, RunState::Finished(_)))
            .await
            .map_err(|_| AppError::internal("Exit monitor stopped before the run finished"))?
            .clone();

        match finished {
            RunState::Finished(outcome) => Ok(outcome),
            _ => Err(AppError::internal("Run did not finish")),
        }
    }

    /// Request termination and allow the OS a short grace period.
    ///
    /// A no-op once the process has exited or when already requested.
    pub async fn shutdown(&self) {
        if !self.is_running() {
            return;
        }

        if self.inner.cancel.send_replace(true) {
            return;
        }

        self.inner.logger
            .log_cancel(self.inner.role, self.inner.run_index, &self.inner.correlation_id)
            .await;
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    }
}
