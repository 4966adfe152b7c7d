use ethers::abi::Token;
use ethers::types::{Address, U256};
use futures_util::future::join_all;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;

use crate::{
    error::{ErrorKind, Result},
    integrations::{NameLookup, ReadClient},
    models::{Auction, Listing, MarketConstants, Offer, TokenRef},
};

use super::cache_keys::{
    account_key, contract_key, nft_owner_key, token_key, QueryKey, OP_ALL_ACTIVE_AUCTIONS,
    OP_ALL_LISTED, OP_ALL_OFFERS_FOR_NFT, OP_APPROVAL_STATUS, OP_CONSTANTS, OP_COUNTER_PRICE,
    OP_GET_AUCTION, OP_GET_LISTING, OP_GET_OFFER, OP_OWNER,
};
use super::clients::ClientRegistry;
use super::contract_config::{ContractConfig, ResolveOptions};
use super::decoder;
use super::query_cache::QueryCache;

const CONSTANT_VIEWS: [&str; 7] = [
    "PLATFORM_FEE_BPS",
    "PLATFORM_FEE_RECIPIENT",
    "MIN_BID_INCREMENT_BPS",
    "ABSOLUTE_MIN_BID",
    "AUCTION_TIME_EXTENSION",
    "AUCTION_EXTENSION_THRESHOLD",
    "OFFER_EXPIRY_TIME",
];

/// Marketplace reads served through the query cache.
///
/// Entries are stored under the same keys the mutation catalogue
/// invalidates, so a successful write forces the next read to hit the chain.
pub struct TradeReader {
    registry: Arc<ClientRegistry>,
    cache: Arc<dyn QueryCache>,
    names: NameLookup,
}

struct Target {
    config: Arc<ContractConfig>,
    client: Arc<dyn ReadClient>,
}

impl Target {
    async fn read(&self, function_name: &str, args: Vec<Token>) -> Result<Vec<Token>> {
        self.client
            .read_contract(self.config.contract_address, &self.config.abi, function_name, args)
            .await
    }
}

impl TradeReader {
    pub fn new(registry: Arc<ClientRegistry>, cache: Arc<dyn QueryCache>, names: NameLookup) -> Self {
        Self {
            registry,
            cache,
            names,
        }
    }

    fn target(&self, options: &ResolveOptions) -> Result<Target> {
        Ok(Target {
            config: self.registry.contract_config(options),
            client: self.registry.read_client(options)?,
        })
    }

    async fn cached<T, F>(&self, key: QueryKey, load: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Future<Output = Result<T>>,
    {
        match self.cache.get(&key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(hit) => return Ok(hit),
                Err(e) => tracing::warn!("Discarding unreadable cache entry {}: {}", key, e),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("Cache read for {} failed: {}", key, e),
        }

        let value = load.await?;
        match serde_json::to_value(&value) {
            Ok(json) => {
                if let Err(e) = self.cache.put(&key, json).await {
                    tracing::warn!("Cache write for {} failed: {}", key, e);
                }
            }
            Err(e) => tracing::warn!("Cannot cache {}: {}", key, e),
        }
        Ok(value)
    }

    // ==================== LISTINGS ====================

    /// Listing for one token with its live offers attached.
    ///
    /// # Returns
    /// * `None` when the token is not listed.
    pub async fn get_listing(
        &self,
        nft: Address,
        token_id: U256,
        options: &ResolveOptions,
    ) -> Result<Option<Listing>> {
        let target = self.target(options)?;
        let key = token_key(target.config.network, OP_GET_LISTING, &nft, &token_id);
        let listing = self
            .cached(key, async {
                let output = target
                    .read("getListing", vec![Token::Address(nft), Token::Uint(token_id)])
                    .await?;
                decoder::decode_listing(output)
            })
            .await?;

        let Some(mut listing) = listing else {
            return Ok(None);
        };
        listing.offers = match self.get_offers(nft, token_id, options).await {
            Ok(offers) => offers,
            Err(e) => {
                tracing::warn!("Offers for {:?}/{} unavailable: {}", nft, token_id, e);
                Vec::new()
            }
        };
        Ok(Some(listing))
    }

    /// Every listed token with details. Tokens whose listing cannot be read are skipped.
    pub async fn get_all_listings(&self, options: &ResolveOptions) -> Result<Vec<Listing>> {
        let target = self.target(options)?;
        let refs = self
            .token_refs(&target, "getAllListedNfts", contract_key(target.config.network, OP_ALL_LISTED))
            .await?;

        let mut listings = Vec::with_capacity(refs.len());
        for token in refs {
            match self.get_listing(token.nft, token.token_id, options).await {
                Ok(Some(listing)) => listings.push(listing),
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    "Skipping listing {:?}/{}: {}",
                    token.nft,
                    token.token_id,
                    e
                ),
            }
        }
        Ok(listings)
    }

    async fn token_refs(&self, target: &Target, function_name: &str, key: QueryKey) -> Result<Vec<TokenRef>> {
        self.cached(key, async {
            let output = target.read(function_name, vec![]).await?;
            decoder::decode_token_refs(output, function_name)
        })
        .await
    }

    // ==================== OFFERS ====================

    pub async fn get_offerers(
        &self,
        nft: Address,
        token_id: U256,
        options: &ResolveOptions,
    ) -> Result<Vec<Address>> {
        let target = self.target(options)?;
        let key = token_key(target.config.network, OP_ALL_OFFERS_FOR_NFT, &nft, &token_id);
        self.cached(key, async {
            let output = target
                .read("getAllOffersForNft", vec![Token::Address(nft), Token::Uint(token_id)])
                .await?;
            decoder::decode_address_list(output, "getAllOffersForNft")
        })
        .await
    }

    /// `None` for a canceled or empty offer slot.
    pub async fn get_offer(
        &self,
        nft: Address,
        token_id: U256,
        offerer: Address,
        options: &ResolveOptions,
    ) -> Result<Option<Offer>> {
        let target = self.target(options)?;
        let key = account_key(target.config.network, OP_GET_OFFER, &nft, &token_id, &offerer);
        self.cached(key, async {
            let output = target
                .read(
                    "getOffer",
                    vec![Token::Address(nft), Token::Uint(token_id), Token::Address(offerer)],
                )
                .await?;
            decoder::decode_offer(output)
        })
        .await
    }

    /// Live offers on a token. Offers that fail to load are left out.
    pub async fn get_offers(
        &self,
        nft: Address,
        token_id: U256,
        options: &ResolveOptions,
    ) -> Result<Vec<Offer>> {
        let offerers = self.get_offerers(nft, token_id, options).await?;
        let loaded = join_all(
            offerers
                .iter()
                .map(|offerer| self.get_offer(nft, token_id, *offerer, options)),
        )
        .await;

        Ok(loaded
            .into_iter()
            .filter_map(|result| match result {
                Ok(offer) => offer,
                Err(e) => {
                    tracing::debug!("Dropping unreadable offer: {}", e);
                    None
                }
            })
            .collect())
    }

    pub async fn counter_price(
        &self,
        nft: Address,
        token_id: U256,
        bidder: Address,
        options: &ResolveOptions,
    ) -> Result<U256> {
        let target = self.target(options)?;
        let key = account_key(target.config.network, OP_COUNTER_PRICE, &nft, &token_id, &bidder);
        self.cached(key, async {
            let output = target
                .read(
                    "counterPrice",
                    vec![Token::Address(nft), Token::Uint(token_id), Token::Address(bidder)],
                )
                .await?;
            decoder::decode_uint(output, "counterPrice")
        })
        .await
    }

    pub async fn approval_status(
        &self,
        nft: Address,
        token_id: U256,
        owner: Address,
        options: &ResolveOptions,
    ) -> Result<bool> {
        let target = self.target(options)?;
        let key = account_key(target.config.network, OP_APPROVAL_STATUS, &nft, &token_id, &owner);
        self.cached(key, async {
            let output = target
                .read(
                    "approvalStatus",
                    vec![Token::Address(nft), Token::Uint(token_id), Token::Address(owner)],
                )
                .await?;
            decoder::decode_bool(output, "approvalStatus")
        })
        .await
    }

    // ==================== AUCTIONS ====================

    /// A reverted `getAuction` call means no auction exists for the token.
    pub async fn get_auction(
        &self,
        nft: Address,
        token_id: U256,
        options: &ResolveOptions,
    ) -> Result<Option<Auction>> {
        let target = self.target(options)?;
        let key = token_key(target.config.network, OP_GET_AUCTION, &nft, &token_id);
        self.cached(key, async {
            match target
                .read("getAuction", vec![Token::Address(nft), Token::Uint(token_id)])
                .await
            {
                Ok(output) => decoder::decode_auction(output),
                Err(e) if e.kind() == ErrorKind::Reverted => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Active auctions enriched with display names.
    ///
    /// Rows that fail to load are skipped; a failed name lookup leaves `name` empty.
    pub async fn get_active_auctions(&self, options: &ResolveOptions) -> Result<Vec<Auction>> {
        let target = self.target(options)?;
        let refs = self
            .token_refs(
                &target,
                "getAllActiveAuctions",
                contract_key(target.config.network, OP_ALL_ACTIVE_AUCTIONS),
            )
            .await?;

        let mut auctions = Vec::with_capacity(refs.len());
        for token in refs {
            match self.get_auction(token.nft, token.token_id, options).await {
                Ok(Some(auction)) => auctions.push(auction),
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    "Skipping auction {:?}/{}: {}",
                    token.nft,
                    token.token_id,
                    e
                ),
            }
        }

        let names = join_all(
            auctions
                .iter()
                .map(|auction| self.names.name_for_token(&auction.token_id)),
        )
        .await;
        for (auction, name) in auctions.iter_mut().zip(names) {
            auction.name = name;
        }
        Ok(auctions)
    }

    // ==================== CONTRACT ====================

    pub async fn get_constants(&self, options: &ResolveOptions) -> Result<MarketConstants> {
        let target = self.target(options)?;
        let key = contract_key(target.config.network, OP_CONSTANTS);
        self.cached(key, async {
            let outputs = join_all(CONSTANT_VIEWS.iter().map(|view| target.read(view, vec![])))
                .await
                .into_iter()
                .collect::<Result<Vec<_>>>()?;
            decoder::decode_constants(outputs)
        })
        .await
    }

    pub async fn contract_owner(&self, options: &ResolveOptions) -> Result<Address> {
        let target = self.target(options)?;
        let key = contract_key(target.config.network, OP_OWNER);
        self.cached(key, async {
            let output = target.read("owner", vec![]).await?;
            decoder::decode_address(output, "owner")
        })
        .await
    }

    /// Current holder of a name token; `None` when the collection call fails.
    ///
    /// Failures are not cached, so the next call goes back to the chain.
    pub async fn owner_of(
        &self,
        nft: Address,
        token_id: U256,
        options: &ResolveOptions,
    ) -> Result<Option<Address>> {
        let target = self.target(options)?;
        let key = nft_owner_key(target.config.network, &nft, &token_id);
        let result = self
            .cached(key, async {
                let output = target
                    .client
                    .read_contract(
                        nft,
                        &target.config.collection_abi,
                        "ownerOf",
                        vec![Token::Uint(token_id)],
                    )
                    .await?;
                decoder::decode_address(output, "ownerOf")
            })
            .await;

        match result {
            Ok(owner) => Ok(Some(owner)),
            Err(e) => {
                tracing::warn!("ownerOf {:?}/{} failed: {}", nft, token_id, e);
                Ok(None)
            }
        }
    }
}
