//! Webhook error types for Korvex webhook handling.
//!
//! Only authentication, decoding and persistence failures are errors. Lookup
//! misses and stale events are valid outcomes and never surface here.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::DomainError;

/// Errors that abort webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Envelope token did not match the configured shared secret.
    #[error("Invalid webhook token")]
    Unauthorized,

    /// Request body is not a valid Korvex envelope.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Reading or writing a record failed.
    #[error("Persistence error: {0}")]
    Persistence(DomainError),
}

impl WebhookError {
    /// Returns true if Korvex should redeliver the event.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Persistence(_))
    }

    /// Maps the error to the HTTP status returned to Korvex.
    ///
    /// Korvex redelivers on any 5xx. A malformed envelope is answered with
    /// 500 as well; redelivery is harmless because processing is idempotent.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::Unauthorized => StatusCode::UNAUTHORIZED,
            WebhookError::MalformedEnvelope(_) | WebhookError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code for response bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            WebhookError::Unauthorized => "UNAUTHORIZED",
            WebhookError::MalformedEnvelope(_) => "MALFORMED_ENVELOPE",
            WebhookError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Persistence(err)
    }
}
