//! Error types for the Camunda SDK

// Re-export core error types
pub use camunda_core::{CoreError, TokenEndpointError};

use crate::config::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Main error type for the Camunda SDK
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Codec, configuration or authentication failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The engine answered with an RFC 7807 problem document
    #[error("{0}")]
    Problem(ProblemDetail),

    /// The engine answered with a non-success status and no problem document
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Jobs were still active when the stop deadline passed
    #[error("Worker did not drain within {deadline:?}: {remaining} job(s) still active")]
    DrainTimeout { deadline: Duration, remaining: usize },

    /// `start()` was called on a worker that is already polling
    #[error("Worker already running")]
    AlreadyRunning,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

impl From<ConfigError> for SdkError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidValue(msg) => SdkError::InvalidConfiguration(msg),
        }
    }
}

impl SdkError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Core(e) => e.is_retryable(),
            Self::Http(_) => true,
            Self::Problem(p) => p.status.is_some_and(|s| s >= 500 || s == 429),
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::DrainTimeout { .. } => true,
            _ => false,
        }
    }
}

/// RFC 7807 problem document returned by the REST API
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    pub problem_type: Option<String>,
    pub title: Option<String>,
    pub status: Option<u16>,
    pub detail: Option<String>,
    pub instance: Option<String>,
}

impl ProblemDetail {
    /// Parse a problem document, if `body` is one.
    pub fn from_body(body: &str) -> Option<Self> {
        let problem: Self = serde_json::from_str(body).ok()?;
        if problem.title.is_some() || problem.problem_type.is_some() || problem.detail.is_some() {
            Some(problem)
        } else {
            None
        }
    }
}

impl fmt::Display for ProblemDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = self
            .title
            .as_deref()
            .or(self.problem_type.as_deref())
            .unwrap_or("Request failed");
        write!(f, "{title}")?;
        if let Some(status) = self.status {
            write!(f, " ({status})")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        if let Some(instance) = &self.instance {
            write!(f, " [{instance}]")?;
        }
        Ok(())
    }
}
