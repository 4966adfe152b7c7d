use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod error;
mod integrations;
mod models;
mod services;
mod utils;

use config::Config;
use constants::API_VERSION;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nametrade_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting NameTrade service");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    let services = services::build_services(&config).await?;
    let app_state = api::AppState::new(config.clone(), services);

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Contract target
        .route("/api/v1/config", get(api::market::get_contract_config))
        .route("/api/v1/constants", get(api::market::get_constants))
        .route("/api/v1/owner", get(api::market::get_contract_owner))
        // Listings
        .route("/api/v1/listings", get(api::market::get_listings))
        .route(
            "/api/v1/listings/{nft}/{token_id}",
            get(api::market::get_listing),
        )
        .route(
            "/api/v1/listings/{nft}/{token_id}/approval/{owner}",
            get(api::market::get_approval_status),
        )
        // Offers
        .route(
            "/api/v1/offers/{nft}/{token_id}",
            get(api::market::get_offers),
        )
        .route(
            "/api/v1/offers/{nft}/{token_id}/{offerer}/counter-price",
            get(api::market::get_counter_price),
        )
        // Auctions
        .route("/api/v1/auctions", get(api::market::get_auctions))
        .route(
            "/api/v1/auctions/{nft}/{token_id}",
            get(api::market::get_auction),
        )
        // Collection
        .route(
            "/api/v1/nft/{nft}/{token_id}/owner",
            get(api::market::get_nft_owner),
        )
        // Writes
        .route("/api/v1/trade/{action}", post(api::trade::submit_trade))
        .route("/api/v1/tx/{hash}/receipt", get(api::trade::get_receipt))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
