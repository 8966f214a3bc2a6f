//! Error types for GestureMedia Core

use thiserror::Error;

/// Result type alias for GestureMedia Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in GestureMedia Core
#[derive(Debug, Error)]
pub enum Error {
    /// Camera could not be opened; detection is impossible for this session
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Classifier model or its metadata never became ready
    #[error("Failed to load model '{model}': {message}")]
    ModelLoad {
        /// Model location
        model: String,
        /// Failure reason
        message: String,
    },

    /// Authenticated call attempted without a bearer credential
    #[error("No credential available for {operation}")]
    CredentialMissing {
        /// Operation that required the credential
        operation: String,
    },

    /// Remote controller unreachable or answered with a failure status
    #[error("Transport error: {0}")]
    Transport(String),

    /// A suspend point exceeded its time budget
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Budget in milliseconds
        timeout_ms: u64,
    },

    /// Remote state response was malformed or missing required fields
    #[error("Stale or partial remote state: {0}")]
    StaleRemoteState(String),

    /// Gesture label outside the known vocabulary
    #[error("Unknown gesture label: {0}")]
    UnknownLabel(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed JSON metadata
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a model load error with context
    pub fn model_load(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create a missing-credential error for an operation
    pub fn credential_missing(operation: impl Into<String>) -> Self {
        Self::CredentialMissing {
            operation: operation.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, budget: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms: budget.as_millis() as u64,
        }
    }

    /// Whether this error permanently disables gesture detection
    pub fn is_fatal_to_detection(&self) -> bool {
        matches!(self, Error::DeviceUnavailable(_) | Error::ModelLoad { .. })
    }
}
