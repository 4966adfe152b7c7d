use axum::{extract::{Path, Query, State}, Json};
use serde::{Deserialize, Serialize};

use crate::{
    constants::PLATFORM_FEE_BPS,
    error::{AppError, Result},
    models::{ApiResponse, Auction, Listing, MarketConstants, Offer},
    services::{normalizer::{checksum, normalize_address}, Network},
};

use super::{parse_token, AppState, NetworkQuery};

#[derive(Debug, Serialize)]
pub struct ContractConfigResponse {
    pub network: Network,
    pub chain_id: u64,
    pub chain_name: String,
    pub contract_address: String,
    pub rpc_url: String,
    pub block_explorer_url: Option<String>,
    pub default_platform_fee_bps: u64,
}

#[derive(Debug, Deserialize)]
pub struct OffersQuery {
    pub network: Option<Network>,
    pub active_only: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct OwnerResponse {
    pub owner: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CounterPriceResponse {
    pub counter_price: String,
}

#[derive(Debug, Serialize)]
pub struct ApprovalStatusResponse {
    pub approved: bool,
}

fn active_offers(offers: Vec<Offer>, now: chrono::DateTime<chrono::Utc>) -> Vec<Offer> {
    offers
        .into_iter()
        .filter(|offer| !offer.is_expired(now))
        .collect()
}

/// GET /api/v1/config
pub async fn get_contract_config(
    State(state): State<AppState>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<ApiResponse<ContractConfigResponse>>> {
    let config = state.registry.contract_config(&query.options());

    Ok(Json(ApiResponse::success(ContractConfigResponse {
        network: config.network,
        chain_id: config.chain.id,
        chain_name: config.chain.name.clone(),
        contract_address: checksum(&config.contract_address),
        rpc_url: config.rpc_url.clone(),
        block_explorer_url: config.chain.block_explorer_url.clone(),
        default_platform_fee_bps: PLATFORM_FEE_BPS,
    })))
}

/// GET /api/v1/listings
pub async fn get_listings(
    State(state): State<AppState>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<ApiResponse<Vec<Listing>>>> {
    let listings = state.reader.get_all_listings(&query.options()).await?;
    Ok(Json(ApiResponse::success(listings)))
}

/// GET /api/v1/listings/{nft}/{token_id}
pub async fn get_listing(
    State(state): State<AppState>,
    Path((nft, token_id)): Path<(String, String)>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<ApiResponse<Listing>>> {
    let (nft, token_id) = parse_token(&nft, &token_id)?;
    let listing = state
        .reader
        .get_listing(nft, token_id, &query.options())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No listing for {}/{}", checksum(&nft), token_id)))?;
    Ok(Json(ApiResponse::success(listing)))
}

/// GET /api/v1/listings/{nft}/{token_id}/approval/{owner}
pub async fn get_approval_status(
    State(state): State<AppState>,
    Path((nft, token_id, owner)): Path<(String, String, String)>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<ApiResponse<ApprovalStatusResponse>>> {
    let (nft, token_id) = parse_token(&nft, &token_id)?;
    let owner = normalize_address(&owner)?;
    let approved = state
        .reader
        .approval_status(nft, token_id, owner, &query.options())
        .await?;
    Ok(Json(ApiResponse::success(ApprovalStatusResponse { approved })))
}

/// GET /api/v1/offers/{nft}/{token_id}
pub async fn get_offers(
    State(state): State<AppState>,
    Path((nft, token_id)): Path<(String, String)>,
    Query(query): Query<OffersQuery>,
) -> Result<Json<ApiResponse<Vec<Offer>>>> {
    let (nft, token_id) = parse_token(&nft, &token_id)?;
    let options = NetworkQuery { network: query.network }.options();
    let mut offers = state.reader.get_offers(nft, token_id, &options).await?;
    if query.active_only.unwrap_or(false) {
        offers = active_offers(offers, chrono::Utc::now());
    }
    Ok(Json(ApiResponse::success(offers)))
}

/// GET /api/v1/offers/{nft}/{token_id}/{offerer}/counter-price
pub async fn get_counter_price(
    State(state): State<AppState>,
    Path((nft, token_id, offerer)): Path<(String, String, String)>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<ApiResponse<CounterPriceResponse>>> {
    let (nft, token_id) = parse_token(&nft, &token_id)?;
    let offerer = normalize_address(&offerer)?;
    let price = state
        .reader
        .counter_price(nft, token_id, offerer, &query.options())
        .await?;
    Ok(Json(ApiResponse::success(CounterPriceResponse {
        counter_price: price.to_string(),
    })))
}

/// GET /api/v1/auctions
pub async fn get_auctions(
    State(state): State<AppState>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<ApiResponse<Vec<Auction>>>> {
    let auctions = state.reader.get_active_auctions(&query.options()).await?;
    Ok(Json(ApiResponse::success(auctions)))
}

/// GET /api/v1/auctions/{nft}/{token_id}
pub async fn get_auction(
    State(state): State<AppState>,
    Path((nft, token_id)): Path<(String, String)>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<ApiResponse<Auction>>> {
    let (nft, token_id) = parse_token(&nft, &token_id)?;
    let auction = state
        .reader
        .get_auction(nft, token_id, &query.options())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No auction for {}/{}", checksum(&nft), token_id)))?;
    Ok(Json(ApiResponse::success(auction)))
}

/// GET /api/v1/constants
pub async fn get_constants(
    State(state): State<AppState>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<ApiResponse<MarketConstants>>> {
    let constants = state.reader.get_constants(&query.options()).await?;
    Ok(Json(ApiResponse::success(constants)))
}

/// GET /api/v1/owner
pub async fn get_contract_owner(
    State(state): State<AppState>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<ApiResponse<OwnerResponse>>> {
    let owner = state.reader.contract_owner(&query.options()).await?;
    Ok(Json(ApiResponse::success(OwnerResponse {
        owner: Some(checksum(&owner)),
    })))
}

/// GET /api/v1/nft/{nft}/{token_id}/owner
pub async fn get_nft_owner(
    State(state): State<AppState>,
    Path((nft, token_id)): Path<(String, String)>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<ApiResponse<OwnerResponse>>> {
    let (nft, token_id) = parse_token(&nft, &token_id)?;
    let owner = state.reader.owner_of(nft, token_id, &query.options()).await?;
    Ok(Json(ApiResponse::success(OwnerResponse {
        owner: owner.as_ref().map(checksum),
    })))
}
