use ethers::abi::Token;
use ethers::types::{Address, U256};
use serde::Deserialize;

use crate::{error::Result, models::OfferType};

use super::cache_keys::{
    auction_keys, contract_key, listing_keys, nft_owner_key, offerer_keys, token_key,
    OP_ALL_LISTED, OP_ALL_OFFERS_FOR_NFT, OP_APPROVAL_STATUS, OP_COUNTER_PRICE, OP_GET_LISTING,
    OP_GET_OFFER, OP_OFFERS, OP_OWNER,
};
use super::normalizer::{normalize_address, normalize_addresses, to_big_int, to_big_ints, NumericInput};
use super::write_pipeline::WriteRequest;

// ==================== VARIABLES ====================

#[derive(Debug, Clone, Deserialize)]
pub struct TokenVariables {
    pub nft: String,
    pub token_id: NumericInput,
}

/// Token reference plus the native amount sent with the call.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentVariables {
    pub nft: String,
    pub token_id: NumericInput,
    pub value: NumericInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListVariables {
    pub nft: String,
    pub token_id: NumericInput,
    pub price: NumericInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListWithAllowedBuyersVariables {
    pub nft: String,
    pub token_id: NumericInput,
    pub price: NumericInput,
    pub allowed_buyers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllowedBuyersVariables {
    pub nft: String,
    pub token_id: NumericInput,
    pub allowed_buyers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NftOfferVariables {
    pub nft: String,
    pub token_id: NumericInput,
    pub offer_nfts: Vec<String>,
    pub offer_token_ids: Vec<NumericInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOfferVariables {
    pub nft: String,
    pub token_id: NumericInput,
    pub offerer: String,
    pub new_amount: NumericInput,
    pub offer_type: OfferType,
    #[serde(default)]
    pub value: Option<NumericInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OffererVariables {
    pub nft: String,
    pub token_id: NumericInput,
    pub offerer: String,
    #[serde(default)]
    pub value: Option<NumericInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartAuctionVariables {
    pub nft: String,
    pub token_id: NumericInput,
    pub reserve_price: NumericInput,
    /// Seconds.
    pub duration: NumericInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferOwnershipVariables {
    pub new_owner: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalForAllVariables {
    /// Collection contract the approval is recorded on.
    pub nft: String,
    pub operator: String,
    pub approved: bool,
}

fn token_ref(nft: &str, token_id: &NumericInput) -> Result<(Address, U256)> {
    Ok((normalize_address(nft)?, to_big_int(token_id.clone())?))
}

fn optional_value(value: &Option<NumericInput>) -> Result<Option<U256>> {
    match value {
        Some(value) => Ok(Some(to_big_int(value.clone())?)),
        None => Ok(None),
    }
}

fn address_tokens(addresses: Vec<Address>) -> Token {
    Token::Array(addresses.into_iter().map(Token::Address).collect())
}

// ==================== LISTINGS ====================

pub fn list() -> WriteRequest<ListVariables> {
    WriteRequest::marketplace("list", |v: &ListVariables| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![
            Token::Address(nft),
            Token::Uint(token_id),
            Token::Uint(to_big_int(v.price.clone())?),
        ])
    })
    .invalidates(|v, config, _| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(listing_keys(config.network, &nft, &token_id))
    })
}

pub fn list_with_allowed_buyers() -> WriteRequest<ListWithAllowedBuyersVariables> {
    WriteRequest::marketplace("listWithAllowedBuyers", |v: &ListWithAllowedBuyersVariables| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![
            Token::Address(nft),
            Token::Uint(token_id),
            Token::Uint(to_big_int(v.price.clone())?),
            address_tokens(normalize_addresses(&v.allowed_buyers)?),
        ])
    })
    .invalidates(|v, config, _| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(listing_keys(config.network, &nft, &token_id))
    })
}

pub fn update_allowed_buyers() -> WriteRequest<AllowedBuyersVariables> {
    WriteRequest::marketplace("updateAllowedBuyers", |v: &AllowedBuyersVariables| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![
            Token::Address(nft),
            Token::Uint(token_id),
            address_tokens(normalize_addresses(&v.allowed_buyers)?),
        ])
    })
    .invalidates(|v, config, _| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![
            token_key(config.network, OP_GET_LISTING, &nft, &token_id),
            contract_key(config.network, OP_ALL_LISTED),
        ])
    })
}

pub fn cancel_listing() -> WriteRequest<TokenVariables> {
    WriteRequest::marketplace("cancelListing", |v: &TokenVariables| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![Token::Address(nft), Token::Uint(token_id)])
    })
    .invalidates(|v, config, _| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(listing_keys(config.network, &nft, &token_id))
    })
}

/// A sale transfers the token and settles its offers and any auction.
pub fn buy() -> WriteRequest<PaymentVariables> {
    WriteRequest::marketplace("buy", |v: &PaymentVariables| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![Token::Address(nft), Token::Uint(token_id)])
    })
    .with_value(|v| Ok(Some(to_big_int(v.value.clone())?)))
    .invalidates(|v, config, _| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        let mut keys = listing_keys(config.network, &nft, &token_id);
        keys.push(token_key(config.network, OP_ALL_OFFERS_FOR_NFT, &nft, &token_id));
        keys.push(contract_key(config.network, OP_OFFERS));
        keys.push(contract_key(config.network, OP_GET_OFFER));
        keys.extend(auction_keys(config.network, &nft, &token_id));
        keys.push(nft_owner_key(config.network, &nft, &token_id));
        Ok(keys)
    })
}

// ==================== OFFERS ====================

pub fn make_native_offer() -> WriteRequest<PaymentVariables> {
    WriteRequest::marketplace("makeNativeOffer", |v: &PaymentVariables| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![Token::Address(nft), Token::Uint(token_id)])
    })
    .with_value(|v| Ok(Some(to_big_int(v.value.clone())?)))
    .invalidates(|v, config, _| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok([OP_ALL_OFFERS_FOR_NFT, OP_GET_OFFER, OP_OFFERS, OP_COUNTER_PRICE]
            .iter()
            .map(|op| token_key(config.network, op, &nft, &token_id))
            .collect())
    })
}

pub fn make_nft_offer() -> WriteRequest<NftOfferVariables> {
    WriteRequest::marketplace("makeNFTOffer", |v: &NftOfferVariables| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        let offer_nfts = normalize_addresses(&v.offer_nfts)?;
        let offer_token_ids = to_big_ints(&v.offer_token_ids)?;
        Ok(vec![
            Token::Address(nft),
            Token::Uint(token_id),
            address_tokens(offer_nfts),
            Token::Array(offer_token_ids.into_iter().map(Token::Uint).collect()),
        ])
    })
    .invalidates(|v, config, _| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![
            token_key(config.network, OP_ALL_OFFERS_FOR_NFT, &nft, &token_id),
            token_key(config.network, OP_GET_OFFER, &nft, &token_id),
            token_key(config.network, OP_OFFERS, &nft, &token_id),
        ])
    })
}

pub fn update_offer() -> WriteRequest<UpdateOfferVariables> {
    WriteRequest::marketplace("updateOffer", |v: &UpdateOfferVariables| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![
            Token::Address(nft),
            Token::Uint(token_id),
            Token::Address(normalize_address(&v.offerer)?),
            Token::Uint(to_big_int(v.new_amount.clone())?),
            Token::Uint(U256::from(v.offer_type.code())),
        ])
    })
    .with_value(|v| optional_value(&v.value))
    .invalidates(|v, config, _| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        let offerer = normalize_address(&v.offerer)?;
        Ok(offerer_keys(config.network, &nft, &token_id, &offerer))
    })
}

pub fn remove_offer() -> WriteRequest<OffererVariables> {
    WriteRequest::marketplace("removeOffer", |v: &OffererVariables| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![
            Token::Address(nft),
            Token::Uint(token_id),
            Token::Address(normalize_address(&v.offerer)?),
        ])
    })
    .invalidates(|v, config, _| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        let offerer = normalize_address(&v.offerer)?;
        Ok(offerer_keys(config.network, &nft, &token_id, &offerer))
    })
}

/// Accepting transfers the token, so the owner read is dropped as well.
pub fn accept_offer() -> WriteRequest<OffererVariables> {
    WriteRequest::marketplace("acceptOffer", |v: &OffererVariables| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![
            Token::Address(nft),
            Token::Uint(token_id),
            Token::Address(normalize_address(&v.offerer)?),
        ])
    })
    .with_value(|v| optional_value(&v.value))
    .invalidates(|v, config, _| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        let offerer = normalize_address(&v.offerer)?;
        let mut keys = listing_keys(config.network, &nft, &token_id);
        keys.extend(offerer_keys(config.network, &nft, &token_id, &offerer));
        keys.push(nft_owner_key(config.network, &nft, &token_id));
        Ok(keys)
    })
}

// ==================== AUCTIONS ====================

pub fn start_auction() -> WriteRequest<StartAuctionVariables> {
    WriteRequest::marketplace("startAuction", |v: &StartAuctionVariables| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![
            Token::Address(nft),
            Token::Uint(token_id),
            Token::Uint(to_big_int(v.reserve_price.clone())?),
            Token::Uint(to_big_int(v.duration.clone())?),
        ])
    })
    .invalidates(|v, config, _| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        let mut keys = auction_keys(config.network, &nft, &token_id);
        keys.extend(listing_keys(config.network, &nft, &token_id));
        Ok(keys)
    })
}

pub fn bid() -> WriteRequest<PaymentVariables> {
    WriteRequest::marketplace("bid", |v: &PaymentVariables| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![Token::Address(nft), Token::Uint(token_id)])
    })
    .with_value(|v| Ok(Some(to_big_int(v.value.clone())?)))
    .invalidates(|v, config, _| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(auction_keys(config.network, &nft, &token_id))
    })
}

/// Settling hands the token to the winning bidder.
pub fn end_auction() -> WriteRequest<TokenVariables> {
    WriteRequest::marketplace("endAuction", |v: &TokenVariables| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![Token::Address(nft), Token::Uint(token_id)])
    })
    .invalidates(|v, config, _| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        let mut keys = auction_keys(config.network, &nft, &token_id);
        keys.extend(listing_keys(config.network, &nft, &token_id));
        keys.push(nft_owner_key(config.network, &nft, &token_id));
        Ok(keys)
    })
}

pub fn refund_auction_bids() -> WriteRequest<TokenVariables> {
    WriteRequest::marketplace("refundAuctionBids", |v: &TokenVariables| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(vec![Token::Address(nft), Token::Uint(token_id)])
    })
    .invalidates(|v, config, _| {
        let (nft, token_id) = token_ref(&v.nft, &v.token_id)?;
        Ok(auction_keys(config.network, &nft, &token_id))
    })
}

// ==================== ADMIN ====================

pub fn renounce_ownership() -> WriteRequest<()> {
    WriteRequest::marketplace("renounceOwnership", |_: &()| Ok(vec![]))
        .invalidates(|_, config, _| Ok(vec![contract_key(config.network, OP_OWNER)]))
}

pub fn transfer_ownership() -> WriteRequest<TransferOwnershipVariables> {
    WriteRequest::marketplace("transferOwnership", |v: &TransferOwnershipVariables| {
        Ok(vec![Token::Address(normalize_address(&v.new_owner)?)])
    })
    .invalidates(|_, config, _| Ok(vec![contract_key(config.network, OP_OWNER)]))
}

// ==================== COLLECTION ====================

pub fn set_approval_for_all() -> WriteRequest<ApprovalForAllVariables> {
    WriteRequest::collection(
        "setApprovalForAll",
        |v: &ApprovalForAllVariables| normalize_address(&v.nft),
        |v: &ApprovalForAllVariables| {
            Ok(vec![
                Token::Address(normalize_address(&v.operator)?),
                Token::Bool(v.approved),
            ])
        },
    )
    // approvalStatus is cached per token and owner; the operator grant covers all of them
    .invalidates(|_, config, _| Ok(vec![contract_key(config.network, OP_APPROVAL_STATUS)]))
}
