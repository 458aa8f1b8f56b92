//! Error handling for the iperf3 runner

use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for the iperf3 runner
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// The measurement tool could not be launched
    #[error("Failed to spawn '{}': {reason}", .binary.display())]
    Spawn { binary: PathBuf, reason: String },

    /// The measurement tool exited with a non-zero status
    #[error("Measurement tool exited with code {code}")]
    UnexpectedExit { code: i32 },

    /// Captured output was not a structured document
    #[error("Malformed tool output: {0}")]
    MalformedOutput(String),

    /// Result artifact could not be written
    #[error("Failed to persist result artifact {}: {reason}", .path.display())]
    Persistence { path: PathBuf, reason: String },

    /// Output sinks could not be allocated or read back
    #[error("Output capture error: {0}")]
    Capture(String),

    /// A run or session is already active for this role
    #[error("Already running: {0}")]
    AlreadyRunning(String),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors (numbers, addresses, JSON, etc.)
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new spawn error for the given binary
    pub fn spawn<P: Into<PathBuf>, S: Into<String>>(binary: P, reason: S) -> Self {
        Self::Spawn {
            binary: binary.into(),
            reason: reason.into(),
        }
    }

    /// Create a new unexpected-exit error
    pub fn unexpected_exit(code: i32) -> Self {
        Self::UnexpectedExit { code }
    }

    /// Create a new malformed-output error
    pub fn malformed_output<S: Into<String>>(message: S) -> Self {
        Self::MalformedOutput(message.into())
    }

    /// Create a new persistence error
    pub fn persistence<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new capture error
    pub fn capture<S: Into<String>>(message: S) -> Self {
        Self::Capture(message.into())
    }

    /// Create a new already-running error
    pub fn already_running<S: Into<String>>(message: S) -> Self {
        Self::AlreadyRunning(message.into())
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a new parsing error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Validation(_) => "VALIDATION",
            Self::Spawn { .. } => "SPAWN",
            Self::UnexpectedExit { .. } => "EXIT",
            Self::MalformedOutput(_) => "OUTPUT",
            Self::Persistence { .. } => "PERSIST",
            Self::Capture(_) => "CAPTURE",
            Self::AlreadyRunning(_) => "BUSY",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Check if error is recoverable (the next run may still succeed)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::UnexpectedExit { .. } | Self::MalformedOutput(_) | Self::Persistence { .. } => true,
            Self::AlreadyRunning(_) => true,
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) | Self::Spawn { .. } => false,
            Self::Capture(_) | Self::Io(_) | Self::Internal(_) => false,
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Config(msg) | Self::Validation(msg) => {
                format!("Configuration problem: {}\n\nSuggestion: Check your config file, .env file or command line arguments.", msg)
            }
            Self::Spawn { binary, reason } => {
                format!("Could not launch {}: {}\n\nSuggestion: Install iperf3 or point --binary at the executable.", binary.display(), reason)
            }
            Self::UnexpectedExit { code } => {
                format!("iperf3 exited with code {}\n\nSuggestion: Check that the server is reachable and the port is open.", code)
            }
            Self::MalformedOutput(msg) => {
                format!("The tool output could not be decoded: {}\n\nSuggestion: Make sure JSON reporting is enabled.", msg)
            }
            Self::Persistence { path, reason } => {
                format!("Could not write {}: {}\n\nSuggestion: Check permissions and free space of the output directory.", path.display(), reason)
            }
            Self::Capture(msg) | Self::Io(msg) => {
                format!("File operation failed: {}\n\nSuggestion: Check the temporary directory permissions and disk space.", msg)
            }
            Self::AlreadyRunning(msg) => {
                format!("{}\n\nSuggestion: Stop the active run before starting another one.", msg)
            }
            Self::Parse(msg) => {
                format!("Failed to parse data: {}\n\nSuggestion: Check the format of your input data or configuration files.", msg)
            }
            Self::Internal(msg) => {
                format!("Internal error: {}\n\nThis is likely a bug. Please report this issue with the error details.", msg)
            }
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,  // Invalid configuration/usage
            Self::Spawn { .. } => 2,
            Self::UnexpectedExit { .. } | Self::MalformedOutput(_) => 3,
            Self::AlreadyRunning(_) => 4,
            Self::Io(_) | Self::Capture(_) | Self::Persistence { .. } => 5,  // I/O issues
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Validation(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Spawn { .. } | Self::UnexpectedExit { .. } => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::MalformedOutput(_) | Self::AlreadyRunning(_) => {
                    format!("[{}] {}", category.blue().bold(), message.blue())
                }
                Self::Io(_) | Self::Capture(_) | Self::Persistence { .. } => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

// Standard library error conversions
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<std::fmt::Error> for AppError {
    fn from(error: std::fmt::Error) -> Self {
        Self::io(format!("Formatting error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

impl From<std::net::AddrParseError> for AppError {
    fn from(error: std::net::AddrParseError) -> Self {
        Self::parse(format!("IP address parse error: {}", error))
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = AppError::config("bad port");
        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(err.category(), "CONFIG");

        let err = AppError::spawn("/opt/iperf3", "No such file or directory");
        assert!(err.to_string().contains("/opt/iperf3"));
        assert_eq!(err.category(), "SPAWN");
    }

    #[test]
    fn test_error_recoverability() {
        assert!(AppError::unexpected_exit(1).is_recoverable());
        assert!(AppError::malformed_output("not json").is_recoverable());
        assert!(!AppError::spawn("iperf3", "missing").is_recoverable());
        assert!(!AppError::config("bad").is_recoverable());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::config("x").exit_code(), 1);
        assert_eq!(AppError::spawn("iperf3", "x").exit_code(), 2);
        assert_eq!(AppError::unexpected_exit(1).exit_code(), 3);
        assert_eq!(AppError::already_running("client").exit_code(), 4);
        assert_eq!(AppError::persistence("/tmp/a.json", "denied").exit_code(), 5);
        assert_eq!(AppError::internal("x").exit_code(), 99);
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let app_error: AppError = io_error.into();
        assert!(matches!(app_error, AppError::Io(_)));

        let parse_error = "abc".parse::<u16>().unwrap_err();
        let app_error: AppError = parse_error.into();
        assert!(matches!(app_error, AppError::Parse(_)));

        let json_error = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let app_error: AppError = json_error.into();
        assert!(matches!(app_error, AppError::Parse(_)));
    }

    #[test]
    fn test_console_formatting() {
        let error = AppError::unexpected_exit(1);
        let plain = error.format_for_console(false);
        assert_eq!(plain, "[EXIT] Measurement tool exited with code 1");

        let colored = error.format_for_console(true);
        assert!(colored.contains("EXIT"));
    }

    #[test]
    fn test_user_friendly_message() {
        let message = AppError::spawn("iperf3", "not found").user_friendly_message();
        assert!(message.contains("Suggestion"));
        assert!(message.contains("--binary"));
    }
}
