use axum::{extract::State, Json};
use serde::Serialize;
use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub network: String,
    pub cache: String,
    pub wallet: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // Wallet endpoint is optional; reads keep working without it
    let wallet_status = if state.config.wallet_rpc_url.is_some() {
        "configured".to_string()
    } else {
        "unavailable".to_string()
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        network: state.registry.default_network().to_string(),
        cache: state.cache.backend().to_string(),
        wallet: wallet_status,
    })
}
