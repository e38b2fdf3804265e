//! Error handling module for the update orchestrator
//!
//! Provides the error taxonomy shared by every component using thiserror.
//! Per-host and per-file variants are caught where they occur and turned into
//! log entries; only configuration and reporting errors travel up to the caller.

use std::path::PathBuf;
use thiserror::Error;

use crate::sequencer::TransitionError;

/// Main error type for the update orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Host did not answer the reachability check
    #[error("Host {host} is unreachable")]
    UnreachableHost { host: String },

    /// A required filesystem path does not exist
    #[error("Required path does not exist: {}", path.display())]
    MissingPath { path: PathBuf },

    /// The named service is not installed on the host
    #[error("Service '{service}' not found on {host}")]
    ServiceNotFound { host: String, service: String },

    /// The service did not reach the desired state after the mutating call
    #[error("Service '{service}' on {host} is {actual}, expected {expected}")]
    ServiceStateMismatch {
        host: String,
        service: String,
        expected: String,
        actual: String,
    },

    /// Service reports stopped but a matching process is still alive
    #[error("Service '{service}' on {host} is stopped but process '{process}' is still running")]
    ProcessStillRunning {
        host: String,
        service: String,
        process: String,
    },

    /// A single file failed to copy
    #[error("Failed to copy {} to {}: {reason}", source_file.display(), destination.display())]
    FileCopyFailure {
        source_file: PathBuf,
        destination: PathBuf,
        reason: String,
    },

    /// Post-copy reconciliation found a different number of files
    #[error("File count mismatch: source has {source_count}, destination has {destination_count}")]
    CountMismatch {
        source_count: usize,
        destination_count: usize,
    },

    /// The run log cannot be read or written
    #[error("Log target unavailable: {0}")]
    LogTargetUnavailable(String),

    /// The run log has no entries to summarize
    #[error("Log contains no entries")]
    EmptyLog,

    /// Transport-level failure talking to a remote host
    #[error("Transport error on {host}: {reason}")]
    Transport { host: String, reason: String },

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sequencer state machine transition errors
    #[error("Sequencer transition error: {0}")]
    Transition(#[from] TransitionError),

    /// IO errors (file operations, console)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

// Convenient error constructors
impl OrchestratorError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transport error for a host
    pub fn transport(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Create a log target error
    pub fn log_target(msg: impl Into<String>) -> Self {
        Self::LogTargetUnavailable(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::UnreachableHost {
            host: "TAX-APP01".to_string(),
        };
        assert_eq!(err.to_string(), "Host TAX-APP01 is unreachable");

        let err = OrchestratorError::CountMismatch {
            source_count: 3,
            destination_count: 2,
        };
        assert_eq!(
            err.to_string(),
            "File count mismatch: source has 3, destination has 2"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: OrchestratorError = io_err.into();
        assert!(matches!(err, OrchestratorError::Io(_)));
    }

    #[test]
    fn test_error_constructors() {
        let err = OrchestratorError::transport("TAX-APP02", "WinRM refused");
        assert_eq!(err.to_string(), "Transport error on TAX-APP02: WinRM refused");

        let err = OrchestratorError::log_target("C:\\Logs is read-only");
        assert!(matches!(err, OrchestratorError::LogTargetUnavailable(_)));
    }
}
