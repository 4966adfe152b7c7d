use axum::{extract::{Path, Query, State}, Json};
use ethers::types::H256;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::str::FromStr;

use crate::{
    error::{AppError, Result},
    models::ApiResponse,
    services::{mutations, Network, ResolveOptions, WritePipeline, WriteResult},
};

use super::{AppState, NetworkQuery};

#[derive(Debug, Deserialize)]
pub struct TradeQuery {
    pub network: Option<Network>,
    /// Grant marketplace approval first for `list` and `startAuction`.
    pub approve: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct TradeResponse {
    pub action: String,
    pub tx_hash: String,
}

#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    pub tx_hash: String,
    pub status: Option<u64>,
    pub block_number: Option<u64>,
    pub gas_used: Option<String>,
}

fn variables<V: DeserializeOwned>(action: &str, body: serde_json::Value) -> Result<V> {
    serde_json::from_value(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid {} payload: {}", action, e)))
}

async fn dispatch(
    pipeline: &WritePipeline,
    action: &str,
    body: serde_json::Value,
    options: &ResolveOptions,
    approve: bool,
) -> Result<WriteResult> {
    match action {
        "list" if approve => pipeline.list_with_approval(variables(action, body)?, options).await,
        "list" => {
            pipeline
                .execute_with_chain_retry(&mutations::list(), variables(action, body)?, options)
                .await
        }
        "listWithAllowedBuyers" => {
            pipeline
                .execute_with_chain_retry(
                    &mutations::list_with_allowed_buyers(),
                    variables(action, body)?,
                    options,
                )
                .await
        }
        "updateAllowedBuyers" => {
            pipeline
                .execute_with_chain_retry(
                    &mutations::update_allowed_buyers(),
                    variables(action, body)?,
                    options,
                )
                .await
        }
        "cancelListing" => {
            pipeline
                .execute_with_chain_retry(&mutations::cancel_listing(), variables(action, body)?, options)
                .await
        }
        "buy" => {
            pipeline
                .execute_with_chain_retry(&mutations::buy(), variables(action, body)?, options)
                .await
        }
        "makeNativeOffer" => {
            pipeline
                .execute_with_chain_retry(&mutations::make_native_offer(), variables(action, body)?, options)
                .await
        }
        "makeNFTOffer" => {
            pipeline
                .execute_with_chain_retry(&mutations::make_nft_offer(), variables(action, body)?, options)
                .await
        }
        "updateOffer" => {
            pipeline
                .execute_with_chain_retry(&mutations::update_offer(), variables(action, body)?, options)
                .await
        }
        "removeOffer" => {
            pipeline
                .execute_with_chain_retry(&mutations::remove_offer(), variables(action, body)?, options)
                .await
        }
        "acceptOffer" => {
            pipeline
                .execute_with_chain_retry(&mutations::accept_offer(), variables(action, body)?, options)
                .await
        }
        "startAuction" if approve => {
            pipeline
                .start_auction_with_approval(variables(action, body)?, options)
                .await
        }
        "startAuction" => {
            pipeline
                .execute_with_chain_retry(&mutations::start_auction(), variables(action, body)?, options)
                .await
        }
        "bid" => {
            pipeline
                .execute_with_chain_retry(&mutations::bid(), variables(action, body)?, options)
                .await
        }
        "endAuction" => {
            pipeline
                .execute_with_chain_retry(&mutations::end_auction(), variables(action, body)?, options)
                .await
        }
        "refundAuctionBids" => {
            pipeline
                .execute_with_chain_retry(
                    &mutations::refund_auction_bids(),
                    variables(action, body)?,
                    options,
                )
                .await
        }
        "renounceOwnership" => {
            pipeline
                .execute_with_chain_retry(&mutations::renounce_ownership(), (), options)
                .await
        }
        "transferOwnership" => {
            pipeline
                .execute_with_chain_retry(
                    &mutations::transfer_ownership(),
                    variables(action, body)?,
                    options,
                )
                .await
        }
        "setApprovalForAll" => {
            pipeline
                .execute_with_chain_retry(
                    &mutations::set_approval_for_all(),
                    variables(action, body)?,
                    options,
                )
                .await
        }
        other => Err(AppError::NotFound(format!("Unknown trade action: {}", other))),
    }
}

/// Environment problems caught before submission are routine; anything later is not.
fn log_trade_failure(action: &str, err: AppError) -> AppError {
    if err.kind().is_pre_submission() {
        tracing::info!("{} not submitted: {}", action, err);
    } else {
        tracing::warn!("{} failed: {}", action, err);
    }
    err
}

/// POST /api/v1/trade/{action}
pub async fn submit_trade(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Query(query): Query<TradeQuery>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<ApiResponse<TradeResponse>>> {
    let options = NetworkQuery { network: query.network }.options();
    let result = dispatch(
        &state.pipeline,
        &action,
        body,
        &options,
        query.approve.unwrap_or(false),
    )
    .await
    .map_err(|e| log_trade_failure(&action, e))?;

    Ok(Json(ApiResponse::success(TradeResponse {
        action,
        tx_hash: result.hash_hex(),
    })))
}

/// GET /api/v1/tx/{hash}/receipt
pub async fn get_receipt(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<ApiResponse<ReceiptResponse>>> {
    let hash = H256::from_str(hash.trim())
        .map_err(|e| AppError::BadRequest(format!("Invalid transaction hash {}: {}", hash, e)))?;
    let reader = state.registry.read_client(&query.options())?;
    let receipt = WriteResult::new(hash, reader).wait_for_receipt().await?;

    Ok(Json(ApiResponse::success(ReceiptResponse {
        tx_hash: format!("{:#x}", receipt.transaction_hash),
        status: receipt.status.map(|status| status.as_u64()),
        block_number: receipt.block_number.map(|block| block.as_u64()),
        gas_used: receipt.gas_used.map(|gas| gas.to_string()),
    })))
}
