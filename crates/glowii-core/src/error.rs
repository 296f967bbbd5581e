//! Error types module
//!
//! All failures raised by the enhancement client are unified under [`AppError`]. The variants
//! mirror the four user-facing failure classes (validation, precondition, remote, format) plus an
//! internal catch-all for I/O and encoding problems on the client side.

use std::io;

use crate::validation::ValidationError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a failed remote call
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Coarse classification of an [`AppError`], attached to notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Precondition,
    Remote,
    Format,
    Internal,
}

/// Metadata describing how an error should be presented to the user
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "REMOTE_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether the user can simply retry the operation
    fn is_recoverable(&self) -> bool;

    /// User-facing message (may differ from the internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Remote {operation} call failed: {source}")]
    Remote {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Unsupported format: {0}")]
    Format(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn precondition(message: impl Into<String>) -> Self {
        AppError::Precondition(message.into())
    }

    pub fn remote(operation: &'static str, source: impl Into<anyhow::Error>) -> Self {
        AppError::Remote {
            operation,
            source: source.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        AppError::Format(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Precondition(_) => ErrorKind::Precondition,
            AppError::Remote { .. } => ErrorKind::Remote,
            AppError::Format(_) => ErrorKind::Format,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Format(format!("JSON parsing error: {}", err))
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(ValidationError::FileTooLarge { .. }) => "FILE_TOO_LARGE",
            AppError::Validation(ValidationError::InvalidContentType { .. }) => {
                "INVALID_CONTENT_TYPE"
            }
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Precondition(_) => "PRECONDITION_FAILED",
            AppError::Remote { .. } => "REMOTE_ERROR",
            AppError::Format(_) => "FORMAT_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, AppError::Internal(_))
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Validation(ValidationError::FileTooLarge { max, .. }) => format!(
                "File size must be less than {}MB.",
                max / (1024 * 1024)
            ),
            AppError::Validation(ValidationError::InvalidContentType { .. }) => {
                "Please select a valid image file.".to_string()
            }
            AppError::Validation(err) => err.to_string(),
            AppError::Precondition(msg) => msg.clone(),
            AppError::Remote { operation, .. } => {
                format!("The {} request failed. Please try again.", operation)
            }
            AppError::Format(msg) => msg.clone(),
            AppError::Internal(_) => "Something went wrong. Please try again.".to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            AppError::Validation(_) | AppError::Precondition(_) | AppError::Format(_) => {
                LogLevel::Debug
            }
            AppError::Remote { .. } => LogLevel::Warn,
            AppError::Internal(_) => LogLevel::Error,
        }
    }
}

/// Result alias used across the client crates
pub type AppResult<T> = Result<T, AppError>;
