//! Response DTOs for the Korvex webhook endpoints.

use serde::Serialize;

use crate::domain::billing::EventKind;

/// Body returned for every processed delivery.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookAck {
    pub received: bool,
    pub event: String,
}

impl WebhookAck {
    pub fn for_event(event: &EventKind) -> Self {
        Self {
            received: true,
            event: event.to_string(),
        }
    }
}

/// Body of the webhook liveness probe.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookStatusResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub supported_events: Vec<String>,
}

/// Process liveness.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Standard error response for API errors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}
