// src/api/mod.rs

pub mod health;
pub mod market;
pub mod trade;

use ethers::types::{Address, U256};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    normalizer::{normalize_address, to_big_int},
    ClientRegistry, Network, QueryCache, ResolveOptions, Services, TradeReader, WritePipeline,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub registry: Arc<ClientRegistry>,
    pub cache: Arc<dyn QueryCache>,
    pub pipeline: Arc<WritePipeline>,
    pub reader: Arc<TradeReader>,
}

impl AppState {
    pub fn new(config: Config, services: Services) -> Self {
        Self {
            config,
            registry: services.registry,
            cache: services.cache,
            pipeline: services.pipeline,
            reader: services.reader,
        }
    }
}

/// `?network=mainnet|testnet`; absent means the configured default.
#[derive(Debug, Default, Deserialize)]
pub struct NetworkQuery {
    pub network: Option<Network>,
}

impl NetworkQuery {
    pub fn options(&self) -> ResolveOptions {
        ResolveOptions {
            network: self.network,
            rpc_url_override: None,
        }
    }
}

pub fn parse_token(nft: &str, token_id: &str) -> Result<(Address, U256)> {
    Ok((normalize_address(nft)?, to_big_int(token_id)?))
}

#[cfg(test)]
pub(crate) mod test_state {
    use super::*;

    /// State over the real HTTP factory; no network access happens unless a
    /// handler reaches the chain.
    pub async fn state() -> AppState {
        let config = Config::for_tests();
        let services = crate::services::build_services(&config).await.unwrap();
        AppState::new(config, services)
    }
}
