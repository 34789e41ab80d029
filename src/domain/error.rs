//! # Domain Errors
//!
//! Error taxonomy shared by the catalog loader and the command executor.

use thiserror::Error;

/// Raised while loading configuration or the command catalog. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("command '{name}': {reason}")]
    InvalidCommand { name: String, reason: String },
}

impl ConfigError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidCommand {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single command execution. Never escapes the executor's caller.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command not allowed in this room")]
    PermissionDenied,
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("timed out: {0}")]
    Timeout(&'static str),
}

impl CommandError {
    pub fn upstream(err: impl std::fmt::Display) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl From<reqwest::Error> for CommandError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout("http request")
        } else {
            Self::Upstream(err.to_string())
        }
    }
}

impl From<std::io::Error> for CommandError {
    fn from(err: std::io::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        Self::Upstream(format!("{err:#}"))
    }
}
