// src/models/mod.rs
pub mod serde_helpers;
pub mod trade;

use serde::Serialize;

pub use trade::{Auction, Listing, MarketConstants, Offer, OfferType, TokenRef};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
