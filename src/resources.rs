//! Host CPU and memory usage reported while a run is active
//!
//! A [`ResourceMonitor`] samples the machine every `status_interval` and
//! hands each sample to the [`StatusReporter`] until the watched process
//! exits.

use crate::models::Config;
use crate::process::ProcessHandle;
use crate::status::StatusReporter;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// One sample of host load
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    pub cpu_percent: f32,
    pub memory_percent: f64,
}

impl fmt::Display for ResourceUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CPU: {:.2}% MEM: {:.2}%", self.cpu_percent, self.memory_percent)
    }
}

/// Source of usage samples
pub trait UsageSampler: Send {
    fn sample(&mut self) -> Option<ResourceUsage>;
}

/// Samples the local machine through `sysinfo`
pub struct SystemSampler {
    sys: System,
}

impl SystemSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        // CPU usage is a delta; the first refresh only sets the baseline
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        Self { sys }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageSampler for SystemSampler {
    fn sample(&mut self) -> Option<ResourceUsage> {
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();

        let total = self.sys.total_memory();
        if total == 0 {
            return None;
        }
        Some(ResourceUsage {
            cpu_percent: self.sys.global_cpu_usage(),
            memory_percent: self.sys.used_memory() as f64 / total as f64 * 100.0,
        })
    }
}

/// Periodic usage reporting tied to the lifetime of a process
#[derive(Clone)]
pub struct ResourceMonitor {
    interval: Duration,
    reporter: Arc<dyn StatusReporter>,
}

impl ResourceMonitor {
    pub fn new(interval: Duration, reporter: Arc<dyn StatusReporter>) -> Self {
        Self { interval, reporter }
    }

    /// `None` when the configured interval disables status lines
    pub fn from_config(config: &Config, reporter: Arc<dyn StatusReporter>) -> Option<Self> {
        config.status_interval().map(|interval| Self::new(interval, reporter))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Watch `handle` on a background task using the local machine's counters
    pub fn spawn(&self, handle: ProcessHandle) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move { monitor.watch(&handle, SystemSampler::new()).await })
    }

    /// Report a sample every interval until `handle` has exited.
    ///
    /// The first sample comes one interval after the call.
    pub async fn watch(&self, handle: &ProcessHandle, mut sampler: impl UsageSampler) {
        let exited = handle.wait_exited();
        tokio::pin!(exited);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = &mut exited => break,
                _ = ticker.tick() => {
                    if let Some(usage) = sampler.sample() {
                        self.reporter.resource_usage(handle.role(), &usage).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SessionSummary;
    use crate::logging::{LogLevel, Logger, ProcessLogger};
    use crate::process::{ProcessSupervisor, RunOutcome};
    use crate::report::ResultReader;
    use crate::types::Role;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct UsageLog {
        lines: Mutex<Vec<String>>,
    }

    impl UsageLog {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StatusReporter for UsageLog {
        async fn iteration_started(&self, _iteration: u32, _total: u32) {}

        async fn run_finished(&self, _outcome: &RunOutcome) {}

        async fn session_finished(&self, _summary: &SessionSummary) {}

        async fn resource_usage(&self, role: Role, usage: &ResourceUsage) {
            self.lines.lock().unwrap().push(format!("{} {}", role, usage));
        }

        async fn notice(&self, _text: &str) {}

        async fn warning(&self, _text: &str) {}
    }

    struct FixedSampler(ResourceUsage);

    impl UsageSampler for FixedSampler {
        fn sample(&mut self) -> Option<ResourceUsage> {
            Some(self.0)
        }
    }

    const LOAD: ResourceUsage = ResourceUsage { cpu_percent: 12.5, memory_percent: 40.0 };

    fn supervisor() -> ProcessSupervisor {
        let mut logger = Logger::new("PROC");
        logger.set_level(LogLevel::Error);
        ProcessSupervisor::new("/bin/sh", ProcessLogger::from_logger(logger))
    }

    #[test]
    fn test_usage_line() {
        let usage = ResourceUsage { cpu_percent: 3.456, memory_percent: 71.0 };
        assert_eq!(usage.to_string(), "CPU: 3.46% MEM: 71.00%");
    }

    #[test]
    fn test_system_sampler_reads_memory() {
        let mut sampler = SystemSampler::new();
        let usage = sampler.sample().expect("memory totals");
        assert!(usage.memory_percent > 0.0 && usage.memory_percent <= 100.0);
        assert!(usage.cpu_percent >= 0.0);
    }

    #[test]
    fn test_zero_interval_disables_monitor() {
        let mut config = Config::default();
        let reporter: Arc<dyn StatusReporter> = Arc::new(UsageLog::default());
        assert!(ResourceMonitor::from_config(&config, reporter.clone()).is_some());

        config.status_interval = 0;
        assert!(ResourceMonitor::from_config(&config, reporter).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reports_while_running_and_stops_on_exit() {
        let log = Arc::new(UsageLog::default());
        let monitor = ResourceMonitor::new(Duration::from_millis(50), log.clone());
        let handle = supervisor()
            .start(Role::Server, 0, vec!["-c".into(), "sleep 0.4".into()], ResultReader::new(None))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), monitor.watch(&handle, FixedSampler(LOAD)))
            .await
            .expect("monitor outlived the process");
        assert!(!handle.is_running());

        let lines = log.lines();
        assert!(!lines.is_empty());
        assert!(lines.iter().all(|line| line == "server CPU: 12.50% MEM: 40.00%"));

        let seen = lines.len();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(log.lines().len(), seen);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_finished_process_gets_no_samples() {
        let log = Arc::new(UsageLog::default());
        let monitor = ResourceMonitor::new(Duration::from_millis(10), log.clone());
        let handle = supervisor()
            .start(Role::Client, 0, vec!["-c".into(), "exit 0".into()], ResultReader::new(None))
            .await
            .unwrap();
        handle.wait().await.unwrap();

        monitor.spawn(handle).await.unwrap();
        assert!(log.lines().is_empty());
    }
}
