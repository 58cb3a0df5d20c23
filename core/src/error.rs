//! Core error types for the Camunda 8 client libraries
//!
//! This module contains error types that are shared across the codec, the
//! authentication providers and the SDK built on top of them.

/// Core error type for codec and authentication operations
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An envelope key requested by the caller is absent from the response
    #[error("Shape mismatch: expected key '{key}' in response {envelope}")]
    ShapeMismatch { key: String, envelope: String },

    /// A field's JSON type contradicts its declared directive
    #[error("Type mismatch at '{path}': expected {expected}, got {actual}{}", hint_suffix(.hint))]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
        hint: Option<String>,
    },

    /// An unannotated field carries a number that cannot be held without loss
    #[error(
        "Unsafe number at '{path}': {literal} cannot be represented as a native number without \
         loss of precision. Annotate the field as Int64AsString or BigIntValue"
    )]
    UnsafeNumber { path: String, literal: String },

    /// A value has no lossless JSON form and must be converted by the caller
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// A required configuration value is absent
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    /// The OAuth token endpoint failed or returned an error body
    #[error("Token endpoint failure: {0}")]
    TokenEndpoint(#[from] TokenEndpointError),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_ref()
        .map(|h| format!(" ({h})"))
        .unwrap_or_default()
}

impl CoreError {
    pub(crate) fn type_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
            hint: None,
        }
    }

    /// Whether a caller may reasonably retry the operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TokenEndpoint(_) | Self::Http(_) | Self::Io(_))
    }
}

/// Failure reported by the OAuth token endpoint.
///
/// Cloneable so a single failed request can be handed to every caller that
/// joined the in-flight token request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TokenEndpointError {
    /// Human-readable failure description
    pub message: String,
    /// OAuth `error` code from the response body, if any
    pub error_code: Option<String>,
    /// HTTP status of the response, if one was received
    pub status: Option<u16>,
}

impl TokenEndpointError {
    /// Create a new token endpoint error with only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: None,
            status: None,
        }
    }
}

/// Result type alias for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;
