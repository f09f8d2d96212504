//! Error types for corvid.

use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
///
/// Failures in the distribution engine are isolated per activity and per
/// delivery job: nothing here is intended to tear down the process. Only
/// [`AppError::Config`] raised during startup is fatal to the engine.
#[derive(Debug, Error)]
pub enum AppError {
    // === Submission Errors ===
    /// An inbound queue is at capacity; the caller decides whether to
    /// surface a retry-later response to its own client.
    #[error("Queue full: {0}")]
    QueueFull(&'static str),

    /// No side-effect handler is registered for the activity's
    /// (origin, entity kind, verb) combination.
    #[error("No handler registered for activity: {0}")]
    UnknownActivity(String),

    // === Processing Errors ===
    /// An entity the activity refers to does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The activity is malformed for its handler, e.g. a follow naming no
    /// target account.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A side-effect handler failed or exceeded its deadline.
    #[error("Handler error: {0}")]
    Handler(String),

    /// A remote delivery could not be scheduled or performed.
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// The shutdown drain deadline elapsed with work still outstanding.
    #[error("Shutdown deadline exceeded: {0}")]
    ShutdownTimeout(String),

    // === Engine Errors ===
    /// Invalid configuration, rejected at engine construction.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An invariant the engine relies on was violated.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the error code used in structured logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::QueueFull(_) => "QUEUE_FULL",
            Self::UnknownActivity(_) => "UNKNOWN_ACTIVITY",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Handler(_) => "HANDLER_ERROR",
            Self::Delivery(_) => "DELIVERY_ERROR",
            Self::ShutdownTimeout(_) => "SHUTDOWN_TIMEOUT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether the caller may usefully retry the operation later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::QueueFull(_) | Self::Delivery(_))
    }
}

// === From implementations ===

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::QueueFull("client").error_code(), "QUEUE_FULL");
        assert_eq!(
            AppError::Handler("boom".to_string()).error_code(),
            "HANDLER_ERROR"
        );
        assert_eq!(
            AppError::UnknownActivity("client/report/flag".to_string()).error_code(),
            "UNKNOWN_ACTIVITY"
        );
        assert_eq!(
            AppError::ShutdownTimeout("2 in flight".to_string()).error_code(),
            "SHUTDOWN_TIMEOUT"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(AppError::QueueFull("federator").is_retryable());
        assert!(!AppError::Config("bad".to_string()).is_retryable());
    }
}
