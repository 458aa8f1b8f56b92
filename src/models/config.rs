//! Configuration data model and validation

use crate::types::{AppError, Protocol, Result, Role};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
///
/// One immutable snapshot of this record is taken per run; the process
/// supervisor and argument builder only ever read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path (or bare name resolved via PATH) of the iperf3 executable
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,

    /// Server role settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Client role settings
    #[serde(default)]
    pub client: ClientSettings,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,

    /// Seconds between host CPU/memory status lines while a run is active; 0 disables
    #[serde(default = "default_status_interval")]
    pub status_interval: u64,
}

/// Settings used when running the tool as a server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind to; empty binds all interfaces
    pub listen_address: String,
    pub port: u16,
    /// Report interval in seconds; 0 leaves the tool default
    pub interval: u32,
    pub json_format: bool,
    /// Exit after serving a single client
    pub one_off: bool,
    /// Directory receiving result artifacts
    pub output_dir: Option<PathBuf>,
}

/// Settings used when running the tool as a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Local address to bind to; empty lets the OS choose
    pub listen_address: String,
    /// Server host to connect to
    pub address: String,
    pub port: u16,
    pub protocol: Protocol,
    /// Seconds to transmit for
    pub duration: u32,
    /// Number of parallel streams
    pub streams: u32,
    /// Seconds of warm-up excluded from statistics
    pub omit_seconds: u32,
    /// Read/write buffer length; 0 leaves the tool default
    pub payload_length: u32,
    /// Target bitrate; 0 means unlimited
    pub bandwidth: u64,
    /// KB, MB or GB
    pub bandwidth_unit: String,
    /// Socket buffer size; 0 leaves the OS default
    pub window: u64,
    /// KB, MB or GB
    pub window_unit: String,
    pub dscp: u8,
    pub tos: u8,
    pub no_delay: bool,
    pub zero_copy: bool,
    pub reverse: bool,
    pub bidirectional: bool,
    pub dont_fragment: bool,
    /// TCP maximum segment size; 0 leaves the tool default
    pub set_mss: u32,
    pub ipv4_only: bool,
    pub ipv6_only: bool,
    pub json_format: bool,
    pub repeat_count: u32,
    /// Seconds to wait between repeated runs
    pub repeat_interval: u64,
    /// Directory receiving result artifacts
    pub output_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            server: ServerSettings::default(),
            client: ClientSettings::default(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
            status_interval: default_status_interval(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_address: String::new(),
            port: crate::defaults::DEFAULT_PORT,
            interval: crate::defaults::DEFAULT_SERVER_INTERVAL,
            json_format: true,
            one_off: false,
            output_dir: None,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            listen_address: String::new(),
            address: crate::defaults::DEFAULT_CLIENT_ADDRESS.to_string(),
            port: crate::defaults::DEFAULT_PORT,
            protocol: Protocol::Tcp,
            duration: crate::defaults::DEFAULT_DURATION_SECS,
            streams: 1,
            omit_seconds: 0,
            payload_length: crate::defaults::DEFAULT_PAYLOAD_LENGTH,
            bandwidth: 0,
            bandwidth_unit: "MB".to_string(),
            window: 0,
            window_unit: "KB".to_string(),
            dscp: 0,
            tos: 0,
            no_delay: false,
            zero_copy: false,
            reverse: false,
            bidirectional: false,
            dont_fragment: false,
            set_mss: 0,
            ipv4_only: false,
            ipv6_only: false,
            json_format: true,
            repeat_count: 1,
            repeat_interval: 0,
            output_dir: None,
        }
    }
}

impl ClientSettings {
    /// Pause between two repeated runs
    pub fn repeat_interval(&self) -> Duration {
        Duration::from_secs(self.repeat_interval)
    }
}

impl Config {
    /// Pause between two status lines, `None` when disabled
    pub fn status_interval(&self) -> Option<Duration> {
        (self.status_interval > 0).then(|| Duration::from_secs(self.status_interval))
    }

    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Artifact directory configured for a role, if any
    pub fn output_dir(&self, role: Role) -> Option<&Path> {
        match role {
            Role::Server => self.server.output_dir.as_deref(),
            Role::Client => self.client.output_dir.as_deref(),
        }
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.binary_path.as_os_str().is_empty() {
            return Err(AppError::config("Binary path cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(AppError::config("Server port must be greater than 0"));
        }

        let client = &self.client;
        if client.address.trim().is_empty() {
            return Err(AppError::config("Client server address cannot be empty"));
        }

        if client.port == 0 {
            return Err(AppError::config("Client port must be greater than 0"));
        }

        if client.streams == 0 {
            return Err(AppError::config("Stream count must be greater than 0"));
        }

        if client.repeat_count == 0 {
            return Err(AppError::config("Repeat count must be at least 1"));
        }

        if client.dscp > 63 {
            return Err(AppError::config(format!("DSCP must be between 0 and 63, got: {}", client.dscp)));
        }

        if client.reverse && client.bidirectional {
            return Err(AppError::config("Reverse and bidirectional modes are mutually exclusive"));
        }

        if client.ipv4_only && client.ipv6_only {
            return Err(AppError::config("IPv4-only and IPv6-only are mutually exclusive"));
        }

        for dir in [&self.server.output_dir, &client.output_dir].into_iter().flatten() {
            match std::fs::metadata(dir) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => {
                    return Err(AppError::config(format!("Output path is not a directory: {}", dir.display())));
                }
                Err(_) => {
                    return Err(AppError::config(format!("Output directory does not exist: {}", dir.display())));
                }
            }
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(binary) = std::env::var("IPERF3_BINARY") {
            if !binary.trim().is_empty() {
                self.binary_path = PathBuf::from(binary.trim());
            }
        }

        if let Ok(dir) = std::env::var("IPERF3_OUTPUT_DIR") {
            let dir = dir.trim();
            let dir = if dir.is_empty() { None } else { Some(PathBuf::from(dir)) };
            self.client.output_dir = dir.clone();
            self.server.output_dir = dir;
        }

        if let Ok(address) = std::env::var("CLIENT_ADDRESS") {
            self.client.address = address.trim().to_string();
        }

        if let Ok(port) = std::env::var("CLIENT_PORT") {
            self.client.port = port.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid CLIENT_PORT value '{}': {}", port, e)))?;
        }

        if let Ok(protocol) = std::env::var("CLIENT_PROTOCOL") {
            self.client.protocol = protocol.parse()?;
        }

        if let Ok(duration) = std::env::var("CLIENT_DURATION") {
            self.client.duration = duration.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid CLIENT_DURATION value '{}': {}", duration, e)))?;
        }

        if let Ok(streams) = std::env::var("CLIENT_STREAMS") {
            self.client.streams = streams.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid CLIENT_STREAMS value '{}': {}", streams, e)))?;
        }

        if let Ok(count) = std::env::var("REPEAT_COUNT") {
            self.client.repeat_count = count.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid REPEAT_COUNT value '{}': {}", count, e)))?;
        }

        if let Ok(interval) = std::env::var("REPEAT_INTERVAL") {
            self.client.repeat_interval = interval.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid REPEAT_INTERVAL value '{}': {}", interval, e)))?;
        }

        if let Ok(port) = std::env::var("SERVER_PORT") {
            self.server.port = port.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid SERVER_PORT value '{}': {}", port, e)))?;
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_binary_path() -> PathBuf {
    PathBuf::from(crate::defaults::DEFAULT_BINARY)
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

fn default_status_interval() -> u64 {
    crate::defaults::DEFAULT_STATUS_INTERVAL_SECS
}
