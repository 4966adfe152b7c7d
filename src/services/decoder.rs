//! Strict decoding of marketplace view outputs into the domain models.
//!
//! Every decoder expects exactly the tuple shape declared in the marketplace
//! ABI; anything else is an [`AppError::Abi`].

use ethers::abi::Token;
use ethers::types::{Address, U256};

use crate::{
    error::{AppError, Result},
    models::{Auction, Listing, MarketConstants, Offer, OfferType, TokenRef},
};

fn single(mut output: Vec<Token>, what: &str) -> Result<Token> {
    if output.len() != 1 {
        return Err(AppError::Abi(format!(
            "{}: expected 1 output, got {}",
            what,
            output.len()
        )));
    }
    output
        .pop()
        .ok_or_else(|| AppError::Abi(format!("{}: empty output", what)))
}

fn tuple(token: Token, arity: usize, what: &str) -> Result<Vec<Token>> {
    match token {
        Token::Tuple(fields) if fields.len() == arity => Ok(fields),
        Token::Tuple(fields) => Err(AppError::Abi(format!(
            "{}: expected {} fields, got {}",
            what,
            arity,
            fields.len()
        ))),
        other => Err(AppError::Abi(format!("{}: expected tuple, got {:?}", what, other))),
    }
}

fn address(token: Token, what: &str) -> Result<Address> {
    token
        .into_address()
        .ok_or_else(|| AppError::Abi(format!("{}: expected address", what)))
}

fn uint(token: Token, what: &str) -> Result<U256> {
    token
        .into_uint()
        .ok_or_else(|| AppError::Abi(format!("{}: expected uint", what)))
}

fn boolean(token: Token, what: &str) -> Result<bool> {
    token
        .into_bool()
        .ok_or_else(|| AppError::Abi(format!("{}: expected bool", what)))
}

fn array(token: Token, what: &str) -> Result<Vec<Token>> {
    token
        .into_array()
        .ok_or_else(|| AppError::Abi(format!("{}: expected array", what)))
}

fn addresses(token: Token, what: &str) -> Result<Vec<Address>> {
    array(token, what)?
        .into_iter()
        .map(|item| address(item, what))
        .collect()
}

fn uints(token: Token, what: &str) -> Result<Vec<U256>> {
    array(token, what)?
        .into_iter()
        .map(|item| uint(item, what))
        .collect()
}

/// `getListing`. An empty slot (zero seller) decodes to `None`.
pub fn decode_listing(output: Vec<Token>) -> Result<Option<Listing>> {
    let mut fields = tuple(single(output, "getListing")?, 5, "getListing")?.into_iter();
    let mut next = || fields.next().ok_or_else(|| AppError::Abi("getListing: short tuple".into()));

    let listing = Listing {
        nft: address(next()?, "getListing.nft")?,
        token_id: uint(next()?, "getListing.tokenId")?,
        seller: address(next()?, "getListing.seller")?,
        price: uint(next()?, "getListing.price")?,
        allowed_buyers: addresses(next()?, "getListing.allowedBuyers")?,
        offers: Vec::new(),
    };
    if listing.seller.is_zero() {
        return Ok(None);
    }
    Ok(Some(listing))
}

/// `getOffer`. Canceled slots (zero amount or zero offerer) decode to `None`.
pub fn decode_offer(output: Vec<Token>) -> Result<Option<Offer>> {
    let mut fields = tuple(single(output, "getOffer")?, 8, "getOffer")?.into_iter();
    let mut next = || fields.next().ok_or_else(|| AppError::Abi("getOffer: short tuple".into()));

    let nft = address(next()?, "getOffer.nft")?;
    let token_id = uint(next()?, "getOffer.tokenId")?;
    let offerer = address(next()?, "getOffer.offerer")?;
    let amount = uint(next()?, "getOffer.amount")?;
    let expiry = uint(next()?, "getOffer.expiry")?;
    let type_code = uint(next()?, "getOffer.offerType")?;
    let offer_type = (type_code <= U256::from(u8::MAX))
        .then(|| type_code.low_u32() as u8)
        .and_then(OfferType::from_code)
        .ok_or_else(|| AppError::Abi(format!("getOffer: unknown offer type {}", type_code)))?;

    let offer = Offer {
        nft,
        token_id,
        offerer,
        amount,
        expiry,
        offer_type,
        offer_nfts: addresses(next()?, "getOffer.offerNfts")?,
        offer_token_ids: uints(next()?, "getOffer.offerTokenIds")?,
    };
    if offer.is_canceled() {
        return Ok(None);
    }
    Ok(Some(offer))
}

/// `getAuction`. An empty slot (zero seller) decodes to `None`.
pub fn decode_auction(output: Vec<Token>) -> Result<Option<Auction>> {
    let mut fields = tuple(single(output, "getAuction")?, 8, "getAuction")?.into_iter();
    let mut next = || fields.next().ok_or_else(|| AppError::Abi("getAuction: short tuple".into()));

    let auction = Auction {
        nft: address(next()?, "getAuction.nft")?,
        token_id: uint(next()?, "getAuction.tokenId")?,
        seller: address(next()?, "getAuction.seller")?,
        reserve_price: uint(next()?, "getAuction.reservePrice")?,
        end_time: uint(next()?, "getAuction.endTime")?,
        highest_bidder: address(next()?, "getAuction.highestBidder")?,
        highest_bid: uint(next()?, "getAuction.highestBid")?,
        settled: boolean(next()?, "getAuction.settled")?,
        name: None,
    };
    if auction.seller.is_zero() {
        return Ok(None);
    }
    Ok(Some(auction))
}

/// `getAllListedNfts` / `getAllActiveAuctions`.
pub fn decode_token_refs(output: Vec<Token>, what: &str) -> Result<Vec<TokenRef>> {
    array(single(output, what)?, what)?
        .into_iter()
        .map(|entry| {
            let mut fields = tuple(entry, 2, what)?.into_iter();
            let nft = fields
                .next()
                .ok_or_else(|| AppError::Abi(format!("{}: short tuple", what)))?;
            let token_id = fields
                .next()
                .ok_or_else(|| AppError::Abi(format!("{}: short tuple", what)))?;
            Ok(TokenRef {
                nft: address(nft, what)?,
                token_id: uint(token_id, what)?,
            })
        })
        .collect()
}

pub fn decode_address_list(output: Vec<Token>, what: &str) -> Result<Vec<Address>> {
    addresses(single(output, what)?, what)
}

pub fn decode_address(output: Vec<Token>, what: &str) -> Result<Address> {
    address(single(output, what)?, what)
}

pub fn decode_uint(output: Vec<Token>, what: &str) -> Result<U256> {
    uint(single(output, what)?, what)
}

pub fn decode_bool(output: Vec<Token>, what: &str) -> Result<bool> {
    boolean(single(output, what)?, what)
}

/// Assembles the constants from the seven individual view outputs, in ABI order.
pub fn decode_constants(outputs: Vec<Vec<Token>>) -> Result<MarketConstants> {
    if outputs.len() != 7 {
        return Err(AppError::Abi(format!(
            "constants: expected 7 outputs, got {}",
            outputs.len()
        )));
    }
    let mut outputs = outputs.into_iter();
    let mut next = || {
        outputs
            .next()
            .ok_or_else(|| AppError::Abi("constants: missing output".into()))
    };

    Ok(MarketConstants {
        platform_fee_bps: decode_uint(next()?, "PLATFORM_FEE_BPS")?,
        platform_fee_recipient: decode_address(next()?, "PLATFORM_FEE_RECIPIENT")?,
        min_bid_increment_bps: decode_uint(next()?, "MIN_BID_INCREMENT_BPS")?,
        absolute_min_bid: decode_uint(next()?, "ABSOLUTE_MIN_BID")?,
        auction_time_extension: decode_uint(next()?, "AUCTION_TIME_EXTENSION")?,
        auction_extension_threshold: decode_uint(next()?, "AUCTION_EXTENSION_THRESHOLD")?,
        offer_expiry_time: decode_uint(next()?, "OFFER_EXPIRY_TIME")?,
    })
}
