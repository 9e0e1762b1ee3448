//! Storefront HTTP Server
//!
//! Serves the storefront pages and a thin proxy API in front of the payment
//! processor, so the processor's secret key never reaches the browser.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_payments::{MemoryPaymentLedger, ProcessorClient, WebhookHandler};

use crate::handlers::{
    card_metadata, create_payment_link, create_payment_session, health_check, payment_details,
    processor_webhook, tokenize_card,
};
use crate::state::{AppState, PaymentServices};

/// Router with every API route and the static pages as fallback
fn app(state: AppState, static_dir: &str) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Processor proxy
        .route("/api/payment-links", post(create_payment_link))
        .route("/api/payment-sessions", post(create_payment_session))
        .route("/api/card-metadata", post(card_metadata))
        .route("/api/tokens", post(tokenize_card))
        .route("/api/payments/{id}", get(payment_details))
        // Webhooks
        .route("/webhook/processor", post(processor_webhook))
        // Storefront pages
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let payments = match ProcessorClient::from_env() {
        Ok(client) => {
            tracing::info!(base_url = %client.config().base_url, "✓ Payment processor configured");
            Some(PaymentServices::from_client(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "⚠ Payment processor not configured - payment API disabled");
            tracing::warn!("  Set PROCESSOR_SECRET_KEY and PROCESSOR_PUBLIC_KEY in .env");
            None
        }
    };

    let webhook_secret = std::env::var("PROCESSOR_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());
    if webhook_secret.is_none() {
        tracing::warn!("⚠ PROCESSOR_WEBHOOK_SECRET not set - webhooks will be rejected");
    }

    // Build application state
    let state = AppState {
        payments,
        webhooks: Arc::new(WebhookHandler::new(Arc::new(MemoryPaymentLedger::new()))),
        webhook_secret,
    };

    let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".into());
    let app = app(state, &static_dir);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🛒 storefront server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                - Health check");
    tracing::info!("  POST /api/payment-links     - Hosted payment page link");
    tracing::info!("  POST /api/payment-sessions  - Embedded widget session");
    tracing::info!("  POST /api/card-metadata     - BIN / card lookup");
    tracing::info!("  POST /api/tokens            - Card tokenization");
    tracing::info!("  GET  /api/payments/{{id}}     - Payment details");
    tracing::info!("  POST /webhook/processor     - Processor webhooks");
    tracing::info!("  GET  /*                     - Pages from {}", static_dir);
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
