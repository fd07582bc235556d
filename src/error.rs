//! Error types for the mail server layer
//!
//! API failures come from `mailtm_api` and are wrapped as-is so callers can
//! still match on the status taxonomy (`EntityNotFound`, `RateLimited`, ...).

use crate::retry::{RetryDecision, RetryableError};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, MailServerError>;

#[derive(Error, Debug)]
pub enum MailServerError {
    /// Invalid construction-time configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Settings file failed validation
    #[error("Invalid settings: {0}")]
    Validation(String),

    /// `run()` called while the runner is already running
    #[error("Server is already running")]
    AlreadyRunning,

    /// Mutation or run attempted after `shutdown()`
    #[error("Server has been shut down")]
    ShutDown,

    /// Remote API or transport failure
    #[error("API error: {0}")]
    Api(#[from] mailtm_api::Error),

    /// A subscribed handler failed (or panicked) while handling an event
    #[error("Handler for {event} failed: {message}")]
    Handler { event: String, message: String },

    /// The server behind a weak handle has been dropped
    #[error("Server is no longer available")]
    ServerGone,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

impl MailServerError {
    /// The wrapped API error, if this is one
    pub fn api(&self) -> Option<&mailtm_api::Error> {
        match self {
            MailServerError::Api(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the remote reported a 404
    pub fn is_not_found(&self) -> bool {
        self.api().map(|e| e.is_not_found()).unwrap_or(false)
    }
}

impl RetryableError for MailServerError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            MailServerError::Api(mailtm_api::Error::RateLimited(_)) => {
                // The service asks for a one second pause
                RetryDecision::RetryAfter(Duration::from_secs(1))
            }
            MailServerError::Api(e) if e.is_transient() => RetryDecision::Retry,
            _ => RetryDecision::NoRetry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_decisions() {
        let limited = MailServerError::from(mailtm_api::Error::from_status(429, ""));
        assert_eq!(
            limited.retry_decision(),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );

        let bad_gateway = MailServerError::from(mailtm_api::Error::from_status(502, ""));
        assert_eq!(bad_gateway.retry_decision(), RetryDecision::Retry);

        let missing = MailServerError::from(mailtm_api::Error::from_status(404, ""));
        assert_eq!(missing.retry_decision(), RetryDecision::NoRetry);
        assert!(missing.is_not_found());

        assert_eq!(
            MailServerError::AlreadyRunning.retry_decision(),
            RetryDecision::NoRetry
        );
        assert_eq!(
            MailServerError::from(mailtm_api::Error::Closed).retry_decision(),
            RetryDecision::NoRetry
        );
    }

    #[test]
    fn test_handler_error_display() {
        let err = MailServerError::Handler {
            event: "new_message".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Handler for new_message failed: boom");
    }
}
