//! Command-line interface

use crate::types::{Protocol, Role};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which role the runner plays for this invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Run iperf3 as a server until it exits or Ctrl-C is pressed
    Server,
    /// Run a repeat sequence of iperf3 client measurements
    Client,
}

impl From<Mode> for Role {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Server => Role::Server,
            Mode::Client => Role::Client,
        }
    }
}

/// iperf3 Runner - launches iperf3, captures its JSON report and repeats measurements
#[derive(Parser, Debug, Clone)]
#[command(name = "iperf3r")]
#[command(version, about, long_about = None)]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT"), ", built ", env!("BUILD_TIME"), ", ", env!("TARGET_TRIPLE"), ")"
))]
pub struct Cli {
    /// Role to run
    #[arg(short, long, value_enum, default_value_t = Mode::Client)]
    pub mode: Mode,

    /// JSON config file; created with defaults when missing
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to the iperf3 executable
    #[arg(long, value_name = "PATH")]
    pub binary: Option<PathBuf>,

    /// Server address to connect to (client mode)
    #[arg(short = 'c', long, value_name = "HOST")]
    pub connect: Option<String>,

    /// Local address to bind to
    #[arg(short = 'B', long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Port to listen on or connect to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Use UDP instead of TCP (client mode)
    #[arg(short, long)]
    pub udp: bool,

    /// Seconds to transmit for (client mode)
    #[arg(short = 't', long = "time", value_name = "SECS")]
    pub duration: Option<u32>,

    /// Number of parallel streams (client mode)
    #[arg(short = 'P', long, value_name = "N")]
    pub parallel: Option<u32>,

    /// Target bitrate, 0 for unlimited (client mode)
    #[arg(short, long, value_name = "N")]
    pub bandwidth: Option<u64>,

    /// Unit of --bandwidth (KB, MB, GB)
    #[arg(long, value_name = "UNIT")]
    pub bandwidth_unit: Option<String>,

    /// Server sends, client receives (client mode)
    #[arg(short = 'R', long)]
    pub reverse: bool,

    /// Test in both directions at once (client mode)
    #[arg(long)]
    pub bidir: bool,

    /// Number of sequential client runs
    #[arg(short = 'n', long, value_name = "N")]
    pub repeat: Option<u32>,

    /// Seconds to wait between client runs
    #[arg(long, value_name = "SECS")]
    pub repeat_interval: Option<u64>,

    /// Directory receiving iperf3_<timestamp>.json result files
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Serve a single client, then exit (server mode)
    #[arg(short = '1', long)]
    pub one_off: bool,

    /// Seconds between host CPU/memory status lines, 0 to disable
    #[arg(long, value_name = "SECS")]
    pub status_interval: Option<u64>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub show_config: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn role(&self) -> Role {
        self.mode.into()
    }

    pub fn protocol(&self) -> Option<Protocol> {
        self.udp.then_some(Protocol::Udp)
    }

    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.reverse && self.bidir {
            return Err("Cannot specify both --reverse and --bidir".to_string());
        }

        if self.port == Some(0) {
            return Err("Port must be between 1 and 65535".to_string());
        }

        if self.repeat == Some(0) {
            return Err("--repeat must be at least 1".to_string());
        }

        match self.mode {
            Mode::Server => {
                let client_only = [
                    (self.connect.is_some(), "--connect"),
                    (self.udp, "--udp"),
                    (self.duration.is_some(), "--time"),
                    (self.parallel.is_some(), "--parallel"),
                    (self.bandwidth.is_some(), "--bandwidth"),
                    (self.reverse, "--reverse"),
                    (self.bidir, "--bidir"),
                    (self.repeat.is_some(), "--repeat"),
                    (self.repeat_interval.is_some(), "--repeat-interval"),
                ];
                if let Some((_, flag)) = client_only.iter().find(|(set, _)| *set) {
                    return Err(format!("{} is only valid in client mode", flag));
                }
            }
            Mode::Client => {
                if self.one_off {
                    return Err("--one-off is only valid in server mode".to_string());
                }
            }
        }

        Ok(())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    // Default to true on Unix-like systems, false on Windows
    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
