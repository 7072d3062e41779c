//! HTTP adapters - REST API implementations.

pub mod webhook;

use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use webhook::{webhook_router, WebhookAppState};

/// Complete application router.
///
/// Webhook endpoints are mounted under `/api`, liveness at `/health`. Every
/// request is traced and bounded by `request_timeout`.
pub fn app_router(state: WebhookAppState, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api", webhook_router())
        .route("/health", get(webhook::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
}
