//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - PostgreSQL repositories (sqlx)
//! - `email` - Resend email delivery (reqwest)
//! - `http` - Axum endpoints for Korvex webhooks
//! - `memory` - In-memory store and email sender for tests

pub mod email;
pub mod http;
pub mod memory;
pub mod postgres;

pub use email::ResendEmailSender;
pub use http::{app_router, WebhookAppState};
pub use memory::{InMemoryBillingStore, RecordingEmailSender};
pub use postgres::{
    PostgresCourseCatalog, PostgresCoursePurchaseRepository, PostgresPaymentRepository,
    PostgresSubscriptionRepository, PostgresUserAccessRepository,
};
