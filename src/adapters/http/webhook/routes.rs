//! Axum router configuration for the Korvex webhook endpoints.

use axum::{routing::get, Router};

use super::handlers::{korvex_webhook_status, receive_korvex_webhook, WebhookAppState};

/// Routes relative to the webhook mount point.
///
/// - `GET /korvex` - Liveness probe with supported events
/// - `POST /korvex` - Process a Korvex delivery (token checked inside the envelope)
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new().route("/korvex", get(korvex_webhook_status).post(receive_korvex_webhook))
}

/// Webhook router suitable for mounting at `/api`.
pub fn webhook_router() -> Router<WebhookAppState> {
    Router::new().nest("/webhooks", webhook_routes())
}
