//! HTTP handlers for the Korvex webhook endpoints.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::dto::{ErrorResponse, HealthResponse, WebhookAck, WebhookStatusResponse};
use crate::application::handlers::billing::{
    BillingPorts, HandlePaymentWebhookCommand, HandlePaymentWebhookHandler,
};
use crate::domain::billing::{EventKind, WebhookAuthenticator, WebhookError};
use crate::domain::foundation::Timestamp;

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the webhook endpoints.
#[derive(Clone)]
pub struct WebhookAppState {
    pub ports: BillingPorts,
    pub authenticator: Arc<WebhookAuthenticator>,
}

impl WebhookAppState {
    pub fn new(ports: BillingPorts, authenticator: WebhookAuthenticator) -> Self {
        Self {
            ports,
            authenticator: Arc::new(authenticator),
        }
    }

    /// Create the webhook handler from the shared state.
    pub fn webhook_handler(&self) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::new(self.ports.clone(), self.authenticator.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/korvex - Process a Korvex delivery
pub async fn receive_korvex_webhook(
    State(state): State<WebhookAppState>,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let handler = state.webhook_handler();
    let cmd = HandlePaymentWebhookCommand {
        payload: body.to_vec(),
    };

    let result = handler.handle(cmd).await?;

    Ok(Json(WebhookAck::for_event(&result.event)))
}

/// GET /api/webhooks/korvex - Liveness probe for the Korvex dashboard
pub async fn korvex_webhook_status() -> Json<WebhookStatusResponse> {
    Json(WebhookStatusResponse {
        status: "ok",
        timestamp: Timestamp::now().to_rfc3339(),
        supported_events: EventKind::SUPPORTED
            .iter()
            .map(|kind| kind.as_str().to_string())
            .collect(),
    })
}

/// GET /health - Process liveness
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts webhook errors to HTTP responses.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        let message = match &self.0 {
            WebhookError::Persistence(e) => {
                tracing::error!(error = %e, "Korvex event failed, provider will retry");
                "Failed to process event".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse::new(self.0.error_code(), message);
        (status, Json(body)).into_response()
    }
}

impl WebhookApiError {
    pub fn status(&self) -> StatusCode {
        self.0.status_code()
    }
}
