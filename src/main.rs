//! Korvex Billing server binary.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use korvex_billing::adapters::{
    app_router, PostgresCourseCatalog, PostgresCoursePurchaseRepository,
    PostgresPaymentRepository, PostgresSubscriptionRepository, PostgresUserAccessRepository,
    ResendEmailSender, WebhookAppState,
};
use korvex_billing::application::BillingPorts;
use korvex_billing::config::{AppConfig, ServerConfig};
use korvex_billing::domain::billing::WebhookAuthenticator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        database = %config.database.redacted_url(),
        webhook_authenticated = config.webhook.is_authenticated(),
        "Configuration loaded"
    );
    if !config.webhook.is_authenticated() {
        tracing::warn!("No webhook shared secret configured; Korvex envelopes are not authenticated");
    }

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .max_lifetime(config.database.max_lifetime())
        .connect(&config.database.url)
        .await?;

    let ports = BillingPorts {
        payments: Arc::new(PostgresPaymentRepository::new(pool.clone())),
        subscriptions: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
        course_purchases: Arc::new(PostgresCoursePurchaseRepository::new(pool.clone())),
        users: Arc::new(PostgresUserAccessRepository::new(pool.clone())),
        courses: Arc::new(PostgresCourseCatalog::new(pool)),
        email: Arc::new(ResendEmailSender::new(&config.email)),
    };
    let state = WebhookAppState::new(
        ports,
        WebhookAuthenticator::new(config.webhook.shared_secret.clone()),
    );

    let app = app_router(state, config.server.request_timeout());

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Korvex webhook endpoint listening on POST /api/webhooks/korvex");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
