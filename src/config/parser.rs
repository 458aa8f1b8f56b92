//! Layered configuration loading
//!
//! Sources from lowest to highest precedence: built-in defaults, the JSON
//! config file, the `.env` file, environment variables, command-line flags.

use crate::{
    cli::Cli,
    config::{env::EnvManager, store::ConfigStore},
    error::Result,
    models::Config,
    types::Role,
};

/// Configuration parser that combines every configuration source
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = match &self.cli.config {
            Some(path) => ConfigStore::new(path).load_or_init()?,
            None => Config::default(),
        };

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        if let Some(binary) = &cli.binary {
            config.binary_path = binary.clone();
        }

        match cli.role() {
            Role::Server => {
                let server = &mut config.server;
                if let Some(bind) = &cli.bind {
                    server.listen_address = bind.clone();
                }
                if let Some(port) = cli.port {
                    server.port = port;
                }
                if cli.one_off {
                    server.one_off = true;
                }
                if let Some(dir) = &cli.output_dir {
                    server.output_dir = Some(dir.clone());
                }
            }
            Role::Client => {
                let client = &mut config.client;
                if let Some(address) = &cli.connect {
                    client.address = address.clone();
                }
                if let Some(bind) = &cli.bind {
                    client.listen_address = bind.clone();
                }
                if let Some(port) = cli.port {
                    client.port = port;
                }
                if let Some(protocol) = cli.protocol() {
                    client.protocol = protocol;
                }
                if let Some(duration) = cli.duration {
                    client.duration = duration;
                }
                if let Some(streams) = cli.parallel {
                    client.streams = streams;
                }
                if let Some(bandwidth) = cli.bandwidth {
                    client.bandwidth = bandwidth;
                }
                if let Some(unit) = &cli.bandwidth_unit {
                    client.bandwidth_unit = unit.to_uppercase();
                }
                if cli.reverse {
                    client.reverse = true;
                    client.bidirectional = false;
                }
                if cli.bidir {
                    client.bidirectional = true;
                    client.reverse = false;
                }
                if let Some(count) = cli.repeat {
                    client.repeat_count = count;
                }
                if let Some(interval) = cli.repeat_interval {
                    client.repeat_interval = interval;
                }
                if let Some(dir) = &cli.output_dir {
                    client.output_dir = Some(dir.clone());
                }
            }
        }

        if cli.color {
            config.enable_color = true;
        }
        if cli.no_color {
            config.enable_color = false;
        }
        if let Some(interval) = cli.status_interval {
            config.status_interval = interval;
        }

        // CLI-only
        config.verbose = cli.verbose;
        config.debug = cli.debug;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config, role: Role) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Binary: {}", config.binary_path.display()));
    match role {
        Role::Server => {
            let server = &config.server;
            let bind = if server.listen_address.is_empty() { "*" } else { &server.listen_address };
            summary.push(format!("Listen: {}:{}", bind, server.port));
            summary.push(format!("Report Interval: {}s", server.interval));
            summary.push(format!("One-off: {}", server.one_off));
        }
        Role::Client => {
            let client = &config.client;
            summary.push(format!("Server: {}:{}", client.address, client.port));
            summary.push(format!("Protocol: {}", client.protocol));
            summary.push(format!("Duration: {}s", client.duration));
            summary.push(format!("Streams: {}", client.streams));
            if client.bandwidth > 0 {
                summary.push(format!("Bandwidth: {}{}", client.bandwidth, client.bandwidth_unit));
            }
            summary.push(format!("Repeat: {} x every {}s", client.repeat_count, client.repeat_interval));
        }
    }
    let output_dir = config.output_dir(role)
        .map_or_else(|| "(not saved)".to_string(), |dir| dir.display().to_string());
    summary.push(format!("Output Directory: {}", output_dir));
    summary.push(format!("Status Interval: {}s", config.status_interval));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Environment variables are process-wide
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "IPERF3_BINARY", "IPERF3_OUTPUT_DIR", "CLIENT_ADDRESS", "CLIENT_PORT", "CLIENT_PROTOCOL",
        "CLIENT_DURATION", "CLIENT_STREAMS", "REPEAT_COUNT", "REPEAT_INTERVAL", "SERVER_PORT", "ENABLE_COLOR",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_cli_overrides_client() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let cli = Cli::parse_from(["iperf3r", "-c", "10.1.1.1", "-P", "8", "-u", "-n", "2", "--no-color", "--verbose", "--status-interval", "0"]);
        let config = ConfigParser::new(cli).parse().unwrap();

        assert_eq!(config.client.address, "10.1.1.1");
        assert_eq!(config.client.streams, 8);
        assert_eq!(config.client.protocol, crate::types::Protocol::Udp);
        assert_eq!(config.client.repeat_count, 2);
        assert!(!config.enable_color);
        assert!(config.verbose);
        assert_eq!(config.status_interval, 0);
    }

    #[test]
    fn test_cli_overrides_env_vars() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("CLIENT_STREAMS", "3");
        std::env::set_var("REPEAT_COUNT", "5");

        let cli = Cli::parse_from(["iperf3r", "--parallel", "6"]);
        let config = ConfigParser::new(cli).parse().unwrap();
        clear_env();

        assert_eq!(config.client.streams, 6);
        assert_eq!(config.client.repeat_count, 5);
    }

    #[test]
    fn test_config_file_layer() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("iperf3r.json");
        let mut stored = Config::default();
        stored.client.address = "172.16.0.9".to_string();
        stored.client.duration = 20;
        ConfigStore::new(&path).save(&stored).unwrap();

        std::env::set_var("CLIENT_DURATION", "15");
        let cli = Cli::parse_from(["iperf3r", "--config", path.to_str().unwrap()]);
        let config = ConfigParser::new(cli).parse().unwrap();
        clear_env();

        assert_eq!(config.client.address, "172.16.0.9");
        assert_eq!(config.client.duration, 15);
    }

    #[test]
    fn test_server_overrides_leave_client_alone() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let cli = Cli::parse_from(["iperf3r", "-m", "server", "-p", "6000", "-1"]);
        let config = ConfigParser::new(cli).parse().unwrap();

        assert_eq!(config.server.port, 6000);
        assert!(config.server.one_off);
        assert_eq!(config.client.port, crate::defaults::DEFAULT_PORT);
    }

    #[test]
    fn test_invalid_result_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let dir = TempDir::new().unwrap();
        let cli = Cli::parse_from(["iperf3r", "-o", dir.path().join("missing").to_str().unwrap()]);
        assert!(ConfigParser::new(cli).parse().is_err());
    }

    #[test]
    fn test_config_summary() {
        let config = Config::default();

        let client = display_config_summary(&config, Role::Client);
        assert!(client.contains("Server: 127.0.0.1:5201"));
        assert!(client.contains("Protocol: tcp"));
        assert!(client.contains("(not saved)"));

        let server = display_config_summary(&config, Role::Server);
        assert!(server.contains("Listen: *:5201"));
    }
}
