//! iperf3 Runner
//!
//! Drives repeated network-throughput measurements by launching the iperf3
//! executable as a subprocess, capturing its output into durable sinks and
//! reducing the captured report to structured results. Runs can be repeated
//! on a schedule and cancelled at any time.

pub mod args;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod process;
pub mod report;
pub mod resources;
pub mod status;
pub mod types;

// Re-export commonly used types
pub use args::ArgumentBuilder;
pub use error::{AppError, Result};
pub use executor::{RunController, RunSession, SessionSummary, ShutdownSignal};
pub use models::{Config, MeasurementResult};
pub use process::{OutputCapture, ProcessHandle, ProcessSupervisor, RunOutcome};
pub use report::{ReadOutcome, ResultReader};
pub use resources::{ResourceMonitor, ResourceUsage};
pub use status::{ConsoleReporter, StatusReporter};
pub use types::{Protocol, Role};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");
pub const TARGET_TRIPLE: &str = env!("TARGET_TRIPLE");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    #[cfg(windows)]
    pub const DEFAULT_BINARY: &str = "iperf3.exe";
    #[cfg(not(windows))]
    pub const DEFAULT_BINARY: &str = "iperf3";

    pub const DEFAULT_PORT: u16 = 5201;
    pub const DEFAULT_SERVER_INTERVAL: u32 = 1;
    pub const DEFAULT_CLIENT_ADDRESS: &str = "127.0.0.1";
    pub const DEFAULT_DURATION_SECS: u32 = 10;
    pub const DEFAULT_PAYLOAD_LENGTH: u32 = 1024;
    pub const DEFAULT_ENABLE_COLOR: bool = true;
    pub const DEFAULT_STATUS_INTERVAL_SECS: u64 = 5;

    /// Time allowed for the OS to deliver a termination request
    pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

    /// Artifact file name pattern: `iperf3_<timestamp>.json`
    pub const ARTIFACT_PREFIX: &str = "iperf3_";
    pub const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";
}
