//! Query keys shared by cached reads and write invalidation descriptors.
//!
//! Token ids are always rendered as base-10 strings and addresses in checksum
//! form, so a read and the invalidation for the same entity produce equal keys.

use ethers::types::{Address, U256};
use serde::Serialize;
use std::fmt;

use crate::constants::{QUERY_NAMESPACE_NAME_TRADE, QUERY_NAMESPACE_NFT};

use super::contract_config::Network;
use super::normalizer::checksum;

pub const OP_GET_LISTING: &str = "getListing";
pub const OP_LISTINGS: &str = "listings";
pub const OP_ALL_LISTED: &str = "getAllListedNftsWithDetails";
pub const OP_GET_OFFER: &str = "getOffer";
pub const OP_OFFERS: &str = "offers";
pub const OP_ALL_OFFERS_FOR_NFT: &str = "getAllOffersForNft";
pub const OP_COUNTER_PRICE: &str = "counterPrice";
pub const OP_APPROVAL_STATUS: &str = "approvalStatus";
pub const OP_GET_AUCTION: &str = "getAuction";
pub const OP_AUCTIONS: &str = "auctions";
pub const OP_ALL_ACTIVE_AUCTIONS: &str = "getAllActiveAuctionsWithDetails";
pub const OP_OWNER: &str = "owner";
pub const OP_CONSTANTS: &str = "constants";
pub const OP_OWNER_OF: &str = "ownerOf";

/// Ordered key parts. A key also acts as a prefix matching every longer key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Flat string form used by string-keyed stores.
    pub fn to_cache_string(&self) -> String {
        self.0.join(":")
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

pub fn token_id_part(token_id: &U256) -> String {
    token_id.to_string()
}

/// `[nameTrade, network, operation]`
pub fn contract_key(network: Network, operation: &str) -> QueryKey {
    QueryKey::new([QUERY_NAMESPACE_NAME_TRADE, network.as_str(), operation])
}

/// `[nameTrade, network, operation, nft, tokenId]`
pub fn token_key(network: Network, operation: &str, nft: &Address, token_id: &U256) -> QueryKey {
    QueryKey::new([
        QUERY_NAMESPACE_NAME_TRADE.to_string(),
        network.as_str().to_string(),
        operation.to_string(),
        checksum(nft),
        token_id_part(token_id),
    ])
}

/// `[nameTrade, network, operation, nft, tokenId, account]`
pub fn account_key(
    network: Network,
    operation: &str,
    nft: &Address,
    token_id: &U256,
    account: &Address,
) -> QueryKey {
    QueryKey::new([
        QUERY_NAMESPACE_NAME_TRADE.to_string(),
        network.as_str().to_string(),
        operation.to_string(),
        checksum(nft),
        token_id_part(token_id),
        checksum(account),
    ])
}

/// `[nft, ownerOf, network, nft, tokenId]`
pub fn nft_owner_key(network: Network, nft: &Address, token_id: &U256) -> QueryKey {
    QueryKey::new([
        QUERY_NAMESPACE_NFT.to_string(),
        OP_OWNER_OF.to_string(),
        network.as_str().to_string(),
        checksum(nft),
        token_id_part(token_id),
    ])
}

/// Every listing read for one token, plus the aggregated listing view.
pub fn listing_keys(network: Network, nft: &Address, token_id: &U256) -> Vec<QueryKey> {
    vec![
        token_key(network, OP_GET_LISTING, nft, token_id),
        token_key(network, OP_LISTINGS, nft, token_id),
        contract_key(network, OP_ALL_LISTED),
    ]
}

/// Every auction read for one token, plus the aggregated active-auction view.
pub fn auction_keys(network: Network, nft: &Address, token_id: &U256) -> Vec<QueryKey> {
    vec![
        token_key(network, OP_AUCTIONS, nft, token_id),
        token_key(network, OP_GET_AUCTION, nft, token_id),
        contract_key(network, OP_ALL_ACTIVE_AUCTIONS),
    ]
}

/// Offer reads narrowed to one offerer, plus the offerer list of the token.
pub fn offerer_keys(
    network: Network,
    nft: &Address,
    token_id: &U256,
    offerer: &Address,
) -> Vec<QueryKey> {
    vec![
        token_key(network, OP_ALL_OFFERS_FOR_NFT, nft, token_id),
        account_key(network, OP_GET_OFFER, nft, token_id, offerer),
        account_key(network, OP_OFFERS, nft, token_id, offerer),
        account_key(network, OP_COUNTER_PRICE, nft, token_id, offerer),
    ]
}
