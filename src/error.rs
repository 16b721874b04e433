//! Error types for media-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (store, acquisition, task state)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{TaskId, TaskStatus};

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "output_dir")
        key: Option<String>,
    },

    /// Key-value store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Media acquisition failed
    #[error("acquisition error: {0}")]
    Acquire(#[from] AcquireError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Task, file or key not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Task exists but has not produced a servable file
    #[error("task {task_id} is not ready (status: {status})")]
    NotReady {
        /// The task that was requested
        task_id: TaskId,
        /// Its current status
        status: TaskStatus,
    },

    /// Source URL rejected before enqueueing
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Attempted task status transition violates the state machine
    #[error("invalid task transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: TaskStatus,
        /// Requested status
        to: TaskStatus,
    },

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Key-value store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to connect to the backing database
    #[error("failed to connect to store: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// A stored value could not be interpreted (e.g. a counter that is not an integer)
    #[error("invalid value for key {key}: {reason}")]
    InvalidValue {
        /// The offending key
        key: String,
        /// Why the value was rejected
        reason: String,
    },
}

/// Acquisition errors raised by the executor
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The external download tool is not installed
    #[error(
        "{tool} is not installed. Please install it first:\n\
         On macOS: brew install {tool}\n\
         On Linux: sudo apt install {tool} or sudo pip install {tool}"
    )]
    ToolMissing {
        /// Name of the missing binary
        tool: String,
    },

    /// The destination directory could not be created or read
    #[error("output directory {path} is unavailable: {reason}")]
    DirectoryUnavailable {
        /// Destination directory
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// The tool process could not be started
    #[error("failed to start download tool: {0}")]
    Spawn(String),

    /// The tool exited with a non-zero status
    #[error("download tool failed (exit code {exit_code:?}): {stderr}")]
    ToolFailed {
        /// Exit code, if the process was not killed by a signal
        exit_code: Option<i32>,
        /// Captured standard error of the tool
        stderr: String,
    },

    /// The tool reported success but no file carrying the hash exists
    #[error("no downloaded file found with hash {hash}")]
    OutputNotFound {
        /// Content hash the file name should end with
        hash: String,
    },

    /// The staged file never reached its final name
    #[error("timeout waiting for file processing after {waited:?} (hash {hash})")]
    FinalizeTimeout {
        /// Content hash of the staged file
        hash: String,
        /// How long we waited
        waited: Duration,
    },

    /// The job was cancelled before acquisition finished
    #[error("download cancelled")]
    Cancelled,

    /// The job exceeded its deadline
    #[error("download timed out after {after:?}")]
    TimedOut {
        /// Configured deadline
        after: Duration,
    },
}

impl AcquireError {
    /// Whether re-running the same acquisition could plausibly succeed
    ///
    /// Precondition failures (missing tool, unusable directory) and explicit
    /// cancellation are not retryable; tool and timing failures are.
    pub fn is_retryable(&self) -> bool {
        match self {
            AcquireError::ToolMissing { .. }
            | AcquireError::DirectoryUnavailable { .. }
            | AcquireError::Cancelled => false,
            AcquireError::Spawn(_)
            | AcquireError::ToolFailed { .. }
            | AcquireError::OutputNotFound { .. }
            | AcquireError::FinalizeTimeout { .. }
            | AcquireError::TimedOut { .. } => true,
        }
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "not found: task 7f1c...",
///     "details": { "task_id": "7f1c..." }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_url")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidUrl(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 409 Conflict - task is not in a state that allows the request
            Error::NotReady { .. } => 409,
            Error::InvalidTransition { .. } => 409,

            // 500 Internal Server Error - Server-side issues
            Error::Store(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            Error::Acquire(e) => match e {
                AcquireError::ToolMissing { .. } => 503,
                AcquireError::DirectoryUnavailable { .. } => 500,
                AcquireError::Cancelled => 409,
                AcquireError::TimedOut { .. } | AcquireError::FinalizeTimeout { .. } => 504,
                AcquireError::Spawn(_)
                | AcquireError::ToolFailed { .. }
                | AcquireError::OutputNotFound { .. } => 502,
            },

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Store(_) => "store_error",
            Error::Acquire(e) => match e {
                AcquireError::ToolMissing { .. } => "tool_missing",
                AcquireError::DirectoryUnavailable { .. } => "directory_unavailable",
                AcquireError::Spawn(_) => "tool_spawn_failed",
                AcquireError::ToolFailed { .. } => "tool_failed",
                AcquireError::OutputNotFound { .. } => "output_not_found",
                AcquireError::FinalizeTimeout { .. } => "finalize_timeout",
                AcquireError::Cancelled => "cancelled",
                AcquireError::TimedOut { .. } => "timed_out",
            },
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::NotFound(_) => "not_found",
            Error::NotReady { .. } => "not_ready",
            Error::InvalidUrl(_) => "invalid_url",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::ShuttingDown => "shutting_down",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::NotReady { task_id, status } => Some(serde_json::json!({
                "task_id": task_id,
                "status": status,
            })),
            Error::InvalidTransition { from, to } => Some(serde_json::json!({
                "from": from,
                "to": to,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
