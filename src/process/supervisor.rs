//! Spawning and exit monitoring of the measurement tool

use super::{OutputCapture, ProcessHandle, RunOutcome, RunState, ABNORMAL_EXIT_CODE};
use crate::args::ArgumentBuilder;
use crate::error::{AppError, Result};
use crate::logging::ProcessLogger;
use crate::models::Config;
use crate::report::{ReadOutcome, ResultReader};
use crate::types::Role;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use uuid::Uuid;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Exit as seen by the waiting task
#[derive(Debug, Clone, Copy)]
struct Exit {
    code: i32,
    cancelled: bool,
}

/// Launches the tool and tracks at most one active process per role
///
/// A start request for a role whose previous process is still running is
/// rejected with [`AppError::AlreadyRunning`]. The server and client roles
/// are independent of each other.
#[derive(Debug)]
pub struct ProcessSupervisor {
    binary: PathBuf,
    capture_dir: Option<PathBuf>,
    logger: ProcessLogger,
    active: Mutex<HashMap<Role, ProcessHandle>>,
}

impl ProcessSupervisor {
    pub fn new(binary: impl Into<PathBuf>, logger: ProcessLogger) -> Self {
        Self {
            binary: binary.into(),
            capture_dir: None,
            logger,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.binary_path.clone(), ProcessLogger::new(config))
    }

    /// Allocate capture sinks in `dir` instead of the system temp directory
    pub fn with_capture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.capture_dir = Some(dir.into());
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Start the tool for `role` with explicit arguments.
    ///
    /// Returns once the OS has created the process. Only spawn-time failures
    /// are returned here; exit status and report problems are delivered
    /// through the handle's [`RunOutcome`].
    pub async fn start(&self, role: Role, run_index: u32, args: Vec<String>, reader: ResultReader) -> Result<ProcessHandle> {
        let command_line = ArgumentBuilder::command_line(&self.binary, &args);

        let spawned = self.spawn_locked(role, run_index, &args, reader);
        match &spawned {
            Ok(handle) => {
                self.logger
                    .log_spawn(role, run_index, &command_line, handle.pid(), handle.correlation_id())
                    .await;
            }
            Err(e) => self.logger.log_spawn_failure(role, run_index, e).await,
        }
        spawned
    }

    /// Start the tool for `role` with arguments and artifact directory taken from `config`
    pub async fn start_with_config(&self, config: &Config, role: Role, run_index: u32) -> Result<ProcessHandle> {
        let args = ArgumentBuilder::build(config, role, run_index);
        let reader = ResultReader::for_role(config, role);
        self.start(role, run_index, args, reader).await
    }

    fn spawn_locked(&self, role: Role, run_index: u32, args: &[String], reader: ResultReader) -> Result<ProcessHandle> {
        let mut active = self.active.lock()
            .map_err(|_| AppError::internal("Process table lock poisoned"))?;

        if let Some(current) = active.get(&role) {
            if current.is_running() {
                return Err(AppError::already_running(format!(
                    "iperf3 {} is already running (run {})",
                    role,
                    current.run_index() + 1
                )));
            }
        }

        let capture = match &self.capture_dir {
            Some(dir) => OutputCapture::allocate_in(dir)?,
            None => OutputCapture::allocate()?,
        };
        let (stdout, stderr) = capture.stdio()?;

        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);

        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        let child = command.spawn()
            .map_err(|e| AppError::spawn(&self.binary, e.to_string()))?;

        let correlation_id = Uuid::new_v4().to_string();
        let (state_tx, state_rx) = watch::channel(RunState::Running);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (exit_tx, exit_rx) = oneshot::channel();

        let handle = ProcessHandle::new(
            role,
            run_index,
            child.id(),
            correlation_id.clone(),
            state_rx,
            cancel_tx,
            self.logger.clone(),
        );

        tokio::spawn(wait_for_exit(child, cancel_rx, exit_tx));
        tokio::spawn(monitor(
            exit_rx,
            state_tx,
            capture,
            reader,
            MonitorContext {
                role,
                run_index,
                correlation_id,
                started_at: Instant::now(),
                logger: self.logger.clone(),
            },
        ));

        active.insert(role, handle.clone());
        Ok(handle)
    }

    /// Most recent handle for `role`, running or not
    pub fn active(&self, role: Role) -> Option<ProcessHandle> {
        self.active.lock().ok().and_then(|active| active.get(&role).cloned())
    }

    pub fn is_running(&self, role: Role) -> bool {
        self.active(role).is_some_and(|handle| handle.is_running())
    }

    /// Request termination of the process for `role`, if any
    pub async fn shutdown(&self, role: Role) {
        if let Some(handle) = self.active(role) {
            handle.shutdown().await;
        }
    }

    pub async fn shutdown_all(&self) {
        for role in [Role::Client, Role::Server] {
            self.shutdown(role).await;
        }
    }
}

/// Sole owner of the child: waits for it and delivers the exit exactly once.
///
/// A natural exit that is ready at the same time as a cancellation wins.
async fn wait_for_exit(mut child: Child, mut cancel: watch::Receiver<bool>, exit_tx: oneshot::Sender<Exit>) {
    let (status, cancelled) = tokio::select! {
        biased;
        status = child.wait() => (status, false),
        requested = async { cancel.wait_for(|requested| *requested).await.is_ok() } => {
            if requested {
                // Fails only when the child is already gone
                let _ = child.start_kill();
            }
            (child.wait().await, requested)
        }
    };

    let code = match status {
        Ok(status) => exit_code_of(status),
        Err(_) => ABNORMAL_EXIT_CODE,
    };

    let _ = exit_tx.send(Exit { code, cancelled });
}

struct MonitorContext {
    role: Role,
    run_index: u32,
    correlation_id: String,
    started_at: Instant,
    logger: ProcessLogger,
}

/// Receives the exit, flips the run out of `Running`, then reduces the
/// finalized capture and publishes the outcome.
async fn monitor(
    exit_rx: oneshot::Receiver<Exit>,
    state_tx: watch::Sender<RunState>,
    capture: OutputCapture,
    reader: ResultReader,
    ctx: MonitorContext,
) {
    let exit = exit_rx.await.unwrap_or(Exit {
        code: ABNORMAL_EXIT_CODE,
        cancelled: false,
    });
    let duration = ctx.started_at.elapsed();

    state_tx.send_replace(RunState::Reducing { exit_code: exit.code });
    ctx.logger
        .log_exit(ctx.role, ctx.run_index, exit.code, exit.cancelled, duration, &ctx.correlation_id)
        .await;

    let (reports, diagnostics, capture_error) = match capture.finalize().await {
        Ok(output) => {
            let diagnostics = output.stderr.text();
            if !diagnostics.trim().is_empty() {
                ctx.logger
                    .log_diagnostics(ctx.role, ctx.run_index, &diagnostics, exit.code != 0, &ctx.correlation_id)
                    .await;
            }
            (reader.read_all(output.stdout.bytes()).await, diagnostics, None)
        }
        Err(e) => {
            ctx.logger.log_error(&e, Some("Reading captured output"), Some(&ctx.correlation_id)).await;
            (vec![ReadOutcome::Empty], String::new(), Some(e.to_string()))
        }
    };

    let outcome = RunOutcome {
        role: ctx.role,
        run_index: ctx.run_index,
        exit_code: exit.code,
        cancelled: exit.cancelled,
        duration,
        reports,
        diagnostics,
        capture_error,
    };

    state_tx.send_replace(RunState::Finished(Arc::new(outcome)));
}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    ABNORMAL_EXIT_CODE
}
