//! HTTP adapter for Korvex webhooks.
//!
//! - `GET /api/webhooks/korvex` - Liveness probe
//! - `POST /api/webhooks/korvex` - Korvex event delivery
//! - `GET /health` - Process liveness

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::{ErrorResponse, HealthResponse, WebhookAck, WebhookStatusResponse};
pub use handlers::{health, WebhookApiError, WebhookAppState};
pub use routes::{webhook_router, webhook_routes};
