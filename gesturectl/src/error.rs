//! Error types for the gesture pipeline.
//!
//! Configuration errors are fatal at startup.  Backend and source errors
//! are per-poll values: the loop logs them and keeps polling.

use std::time::Duration;

use thiserror::Error;

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is outside its legal range.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for `GestureConfig`.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure of a single backend call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The execution target is not running (container stopped, no display).
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend has been disabled; no effects are issued.
    #[error("backend disabled")]
    Disabled,

    /// The exec call did not finish in time and was killed.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    /// The helper process could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The helper process exited non-zero.
    #[error("command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },

    /// The helper produced output we could not interpret.
    #[error("unexpected output: {0}")]
    Parse(String),
}

/// Convenience result for backend calls.
pub type BackendResult = Result<(), BackendError>;

/// Failure decoding a landmark frame.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read landmark stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed landmark frame: {0}")]
    Decode(#[from] serde_json::Error),
}
