//! Configuration validation utilities and rules

use crate::{
    error::Result,
    models::{ClientSettings, Config},
    types::Protocol,
};
use colored::Colorize;
use std::net::IpAddr;

/// Units the tool understands as a value suffix
const KNOWN_UNITS: &[&str] = &["KB", "MB", "GB", "TB"];

/// Configuration validator with advisory checks beyond [`Config::validate`]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration with comprehensive checks
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_client(&config.client));
        warnings.extend(Self::validate_reporting(config));
        warnings.extend(Self::validate_addresses(config));

        Ok(warnings)
    }

    fn validate_client(client: &ClientSettings) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if client.protocol == Protocol::Udp && client.bandwidth == 0 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "UDP test without a bandwidth target; iperf3 defaults to 1 Mbit/s".to_string(),
            ));
        }

        if client.bandwidth > 0 && !is_known_unit(&client.bandwidth_unit) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Unknown bandwidth unit '{}', expected one of {}", client.bandwidth_unit, KNOWN_UNITS.join(", ")),
            ));
        }

        if client.window > 0 && !is_known_unit(&client.window_unit) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Unknown window unit '{}', expected one of {}", client.window_unit, KNOWN_UNITS.join(", ")),
            ));
        }

        if client.duration > 0 && client.omit_seconds >= client.duration {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Omit window ({}s) covers the whole test duration ({}s); no interval will count",
                    client.omit_seconds, client.duration
                ),
            ));
        }

        if client.repeat_count > 1 && client.output_dir.is_none() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("{} repeated runs without an output directory; results are not saved", client.repeat_count),
            ));
        }

        if client.protocol == Protocol::Udp && (client.no_delay || client.set_mss > 0) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "TCP-only options (no-delay, MSS) are ignored for UDP tests".to_string(),
            ));
        }

        warnings
    }

    fn validate_reporting(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if !config.client.json_format {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "Client JSON reporting is disabled; results cannot be decoded".to_string(),
            ));
        }

        if !config.server.json_format && config.server.output_dir.is_some() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "Server JSON reporting is disabled; nothing will be saved to the output directory".to_string(),
            ));
        }

        warnings
    }

    fn validate_addresses(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        let bind_addresses = [
            ("server listen", &config.server.listen_address),
            ("client bind", &config.client.listen_address),
        ];
        for (label, address) in bind_addresses {
            if !address.is_empty() && address.parse::<IpAddr>().is_err() {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("The {} address '{}' is not an IP address", label, address),
                ));
            }
        }

        if let Ok(ip) = config.client.address.parse::<IpAddr>() {
            if ip.is_loopback() {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Client targets loopback address {}; results reflect local throughput only", ip),
                ));
            }

            let family_mismatch = (config.client.ipv4_only && ip.is_ipv6()) || (config.client.ipv6_only && ip.is_ipv4());
            if family_mismatch {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("Client address {} does not match the selected IP family", ip),
                ));
            }
        }

        warnings
    }
}

fn is_known_unit(unit: &str) -> bool {
    KNOWN_UNITS.iter().any(|known| known.eq_ignore_ascii_case(unit))
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    /// Create a new validation warning
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        if !use_color {
            return format!("[{}] {}", self.level.as_str(), self.message);
        }

        let tag = match self.level {
            ValidationLevel::Info => self.level.as_str().blue(),
            ValidationLevel::Warning => self.level.as_str().yellow(),
            ValidationLevel::Error => self.level.as_str().red(),
        };
        format!("[{}] {}", tag.bold(), self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &Config) -> Vec<String> {
        validate_config(config).unwrap().into_iter().map(|w| w.message).collect()
    }

    #[test]
    fn test_validation_warning_format() {
        let warning = ValidationWarning::new(ValidationLevel::Warning, "Test warning".to_string());
        assert_eq!(warning.format(false), "[WARNING] Test warning");
        assert!(warning.format(true).contains("Test warning"));
    }

    #[test]
    fn test_udp_without_bandwidth() {
        let mut config = Config::default();
        config.client.protocol = Protocol::Udp;
        assert!(messages(&config).iter().any(|m| m.contains("1 Mbit/s")));

        config.client.bandwidth = 100;
        assert!(!messages(&config).iter().any(|m| m.contains("1 Mbit/s")));
    }

    #[test]
    fn test_unknown_units() {
        let mut config = Config::default();
        config.client.bandwidth = 10;
        config.client.bandwidth_unit = "PB".to_string();
        config.client.window = 64;
        config.client.window_unit = "kb".to_string();

        let found = messages(&config);
        assert!(found.iter().any(|m| m.contains("bandwidth unit 'PB'")));
        assert!(!found.iter().any(|m| m.contains("window unit")));
    }

    #[test]
    fn test_omit_covers_duration() {
        let mut config = Config::default();
        config.client.duration = 5;
        config.client.omit_seconds = 5;
        assert!(messages(&config).iter().any(|m| m.contains("Omit window")));
    }

    #[test]
    fn test_json_disabled() {
        let mut config = Config::default();
        config.client.json_format = false;
        let warnings = validate_config(&config).unwrap();
        assert!(warnings.iter().any(|w| w.level == ValidationLevel::Warning && w.message.contains("cannot be decoded")));
    }

    #[test]
    fn test_address_checks() {
        let mut config = Config::default();
        config.server.listen_address = "not-an-ip".to_string();
        config.client.ipv6_only = true;

        let found = messages(&config);
        assert!(found.iter().any(|m| m.contains("server listen address")));
        assert!(found.iter().any(|m| m.contains("IP family")));
        assert!(found.iter().any(|m| m.contains("loopback")));
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let mut config = Config::default();
        config.client.streams = 0;
        assert!(validate_config(&config).is_err());
    }
}
