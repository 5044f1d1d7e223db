//! host-bridge HTTP Server
//!
//! Axum-based server bridging a Stripe hosted checkout to game-server
//! provisioning on a Pterodactyl panel.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bridge_billing::{BillingProvider, StripeGateway};
use bridge_panel::{HttpPanelClient, PanelClient};
use bridge_provision::{Orchestrator, ProvisionSettings, ReconciliationStore};

use crate::config::Config;
use crate::handlers::{create_checkout_session, health_check, session_details, stripe_webhook};
use crate::state::AppState;

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
    let config = Config::from_env()?;

    // Panel client
    let panel: Arc<dyn PanelClient> = Arc::new(HttpPanelClient::new(
        &config.panel_base_url,
        &config.panel_api_key,
        config.panel_timeout,
    )?);
    tracing::info!(base_url = %config.panel_base_url, "Panel client configured");

    // Billing gateway
    let gateway = Arc::new(StripeGateway::new(
        &config.stripe_secret_key,
        &config.stripe_webhook_secret,
    ));
    let billing: Arc<dyn BillingProvider> = gateway.clone();
    tracing::info!("Stripe gateway configured");

    // Provisioning workflow
    let store = Arc::new(ReconciliationStore::new(billing.clone()));
    let settings = ProvisionSettings {
        node_id: config.panel_node_id,
        egg_id: config.panel_egg_id,
        max_servers: config.node_server_limit,
        docker_image: config.docker_image.clone(),
        startup: config.startup.clone(),
        min_memory_mb: config::MIN_MEMORY_MB,
        disk_mb: config::DISK_MB,
        cpu_percent: config::CPU_PERCENT,
    };
    let orchestrator = Arc::new(Orchestrator::new(panel, store, settings));

    let app_state = AppState {
        gateway,
        billing,
        orchestrator,
    };

    // CORS: only the storefront origin may call the API
    let origin = config
        .frontend_origin
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("FRONTEND_ORIGIN is not a valid origin: {e}"))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/webhook", post(stripe_webhook))
        .route("/session-details/{session_id}", get(session_details))
        // Legacy storefront path for the same query
        .route("/server-details/{session_id}", get(session_details))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "host-bridge server running");
    tracing::info!("  POST /create-checkout-session - Create Stripe checkout");
    tracing::info!("  POST /webhook                 - Stripe webhook intake");
    tracing::info!("  GET  /session-details/{{id}}    - Payment + server status");
    tracing::info!("  GET  /health                  - Health check");

    axum::serve(listener, app).await?;

    Ok(())
}
