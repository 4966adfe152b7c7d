use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use super::serde_helpers::{address, address_list, uint, uint_list};

// ==================== OFFERS ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferType {
    Native,
    #[serde(rename = "NFT")]
    Nft,
}

impl OfferType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(OfferType::Native),
            1 => Some(OfferType::Nft),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            OfferType::Native => 0,
            OfferType::Nft => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    #[serde(with = "address")]
    pub nft: Address,
    #[serde(with = "uint")]
    pub token_id: U256,
    #[serde(with = "address")]
    pub offerer: Address,
    #[serde(with = "uint")]
    pub amount: U256,
    /// Unix seconds.
    #[serde(with = "uint")]
    pub expiry: U256,
    pub offer_type: OfferType,
    #[serde(with = "address_list")]
    pub offer_nfts: Vec<Address>,
    #[serde(with = "uint_list")]
    pub offer_token_ids: Vec<U256>,
}

impl Offer {
    /// Zero amount or zero offerer marks a canceled offer slot.
    pub fn is_canceled(&self) -> bool {
        self.amount.is_zero() || self.offerer.is_zero()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.expiry.is_zero() {
            return false;
        }
        let now = U256::from(now.timestamp().max(0) as u64);
        self.expiry <= now
    }
}

// ==================== LISTINGS ====================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(with = "address")]
    pub nft: Address,
    #[serde(with = "uint")]
    pub token_id: U256,
    #[serde(with = "address")]
    pub seller: Address,
    #[serde(with = "uint")]
    pub price: U256,
    #[serde(with = "address_list")]
    pub allowed_buyers: Vec<Address>,
    #[serde(default)]
    pub offers: Vec<Offer>,
}

// ==================== AUCTIONS ====================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    #[serde(with = "address")]
    pub nft: Address,
    #[serde(with = "uint")]
    pub token_id: U256,
    #[serde(with = "address")]
    pub seller: Address,
    #[serde(with = "uint")]
    pub reserve_price: U256,
    #[serde(with = "uint")]
    pub end_time: U256,
    #[serde(with = "address")]
    pub highest_bidder: Address,
    #[serde(with = "uint")]
    pub highest_bid: U256,
    pub settled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `(nft, tokenId)` pair returned by the enumeration views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRef {
    #[serde(with = "address")]
    pub nft: Address,
    #[serde(with = "uint")]
    pub token_id: U256,
}

// ==================== CONSTANTS ====================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConstants {
    #[serde(with = "uint")]
    pub platform_fee_bps: U256,
    #[serde(with = "address")]
    pub platform_fee_recipient: Address,
    #[serde(with = "uint")]
    pub min_bid_increment_bps: U256,
    #[serde(with = "uint")]
    pub absolute_min_bid: U256,
    #[serde(with = "uint")]
    pub auction_time_extension: U256,
    #[serde(with = "uint")]
    pub auction_extension_threshold: U256,
    #[serde(with = "uint")]
    pub offer_expiry_time: U256,
}
