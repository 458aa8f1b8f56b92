//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use crate::types::Protocol;
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific env file if it exists
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# iperf3 Runner Configuration
#
# Values here override the config file and are overridden by command-line
# arguments.

# Path to the iperf3 executable
# IPERF3_BINARY=/usr/bin/iperf3

# Directory receiving iperf3_<timestamp>.json result files
# IPERF3_OUTPUT_DIR=/var/lib/iperf3-runner

# Server to connect to in client mode
# CLIENT_ADDRESS=192.168.1.20
# CLIENT_PORT=5201

# tcp or udp
# CLIENT_PROTOCOL=tcp

# Seconds per run and parallel streams
# CLIENT_DURATION=10
# CLIENT_STREAMS=1

# Number of sequential runs and the pause between them in seconds
# REPEAT_COUNT=1
# REPEAT_INTERVAL=0

# Listening port in server mode
# SERVER_PORT=5201

# Enable colored output (true/false)
# ENABLE_COLOR=true
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "IPERF3_BINARY" | "CLIENT_ADDRESS" => {
                if value.is_empty() {
                    return Err(AppError::config(format!("{} cannot be empty", key)));
                }
            }
            "CLIENT_PORT" | "SERVER_PORT" => {
                let port: u16 = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if port == 0 {
                    return Err(AppError::config(format!("{} must be between 1 and 65535", key)));
                }
            }
            "CLIENT_PROTOCOL" => {
                value.parse::<Protocol>()
                    .map_err(|e| AppError::config(format!("Invalid CLIENT_PROTOCOL: {}", e)))?;
            }
            "CLIENT_DURATION" | "REPEAT_INTERVAL" => {
                value.parse::<u64>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "CLIENT_STREAMS" | "REPEAT_COUNT" => {
                let count: u32 = value.parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if count == 0 {
                    return Err(AppError::config(format!("{} must be at least 1", key)));
                }
            }
            "ENABLE_COLOR" => {
                value.parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("IPERF3_BINARY", "Path to the iperf3 executable", "/usr/bin/iperf3"),
            ("IPERF3_OUTPUT_DIR", "Directory for result files", "/tmp/iperf3"),
            ("CLIENT_ADDRESS", "Server address in client mode", "192.168.1.20"),
            ("CLIENT_PORT", "Server port in client mode", "5201"),
            ("CLIENT_PROTOCOL", "Transport protocol (tcp/udp)", "tcp"),
            ("CLIENT_DURATION", "Seconds per run", "10"),
            ("CLIENT_STREAMS", "Parallel streams", "1"),
            ("REPEAT_COUNT", "Number of sequential runs", "3"),
            ("REPEAT_INTERVAL", "Seconds between runs", "5"),
            ("SERVER_PORT", "Listening port in server mode", "5201"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<18} {}\n", var, description));
            help.push_str(&format!("  {:<18} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Config file (--config)\n");
        help.push_str("  5. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(name, _, _)| {
                let value = std::env::var(name).ok()?;
                Self::validate_env_var(name, &value).err().map(|e| format!("Warning: {}", e))
            })
            .collect()
    }
}
