use ethers::abi::Abi;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::{
    config::Config,
    constants::{
        BASE_MAINNET_CHAIN_ID, BASE_MAINNET_CHAIN_NAME, BASE_MAINNET_EXPLORER_URL,
        BASE_SEPOLIA_CHAIN_ID, BASE_SEPOLIA_CHAIN_NAME, BASE_SEPOLIA_EXPLORER_URL,
        NATIVE_CURRENCY_DECIMALS, NATIVE_CURRENCY_NAME, NATIVE_CURRENCY_SYMBOL,
    },
    error::{AppError, Result},
};

use super::normalizer::normalize_address;

const NAME_TRADE_ABI_JSON: &str = include_str!("../../abi/name_trade.json");
const ERC721_ABI_JSON: &str = include_str!("../../abi/erc721.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `mainnet` only on an exact match of the selector, `testnet` otherwise.
pub fn resolve_default_network(selector: Option<&str>) -> Network {
    match selector {
        Some("mainnet") => Network::Mainnet,
        _ => Network::Testnet,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainDescriptor {
    pub id: u64,
    pub name: String,
    pub native_currency: NativeCurrency,
    pub rpc_url: String,
    pub block_explorer_url: Option<String>,
}

impl ChainDescriptor {
    pub fn id_hex(&self) -> String {
        format!("0x{:x}", self.id)
    }
}

#[derive(Debug, Clone)]
pub struct ContractConfig {
    pub network: Network,
    pub contract_address: Address,
    pub abi: Arc<Abi>,
    pub collection_abi: Arc<Abi>,
    pub chain: ChainDescriptor,
    pub rpc_url: String,
}

impl ContractConfig {
    /// `${network}:${rpcUrl}`, shared by every memoized handle for this target.
    pub fn cache_key(&self) -> String {
        client_cache_key(self.network, &self.rpc_url)
    }
}

pub fn client_cache_key(network: Network, rpc_url: &str) -> String {
    format!("{}:{}", network, rpc_url)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResolveOptions {
    pub network: Option<Network>,
    pub rpc_url_override: Option<String>,
}

impl ResolveOptions {
    pub fn for_network(network: Network) -> Self {
        Self {
            network: Some(network),
            rpc_url_override: None,
        }
    }
}

#[derive(Debug, Clone)]
struct NetworkTarget {
    contract_address: Address,
    default_rpc_url: String,
    chain_id: u64,
    chain_name: &'static str,
    explorer_url: &'static str,
}

/// Resolves [`ContractConfig`]s and memoizes them per `${network}:${rpcUrl}`.
pub struct ContractResolver {
    default_network: Network,
    mainnet: NetworkTarget,
    testnet: NetworkTarget,
    abi: Arc<Abi>,
    collection_abi: Arc<Abi>,
    resolved: RwLock<HashMap<String, Arc<ContractConfig>>>,
}

impl ContractResolver {
    pub fn from_config(config: &Config) -> Result<Self> {
        let abi: Abi = serde_json::from_str(NAME_TRADE_ABI_JSON)
            .map_err(|e| AppError::Abi(format!("Invalid marketplace ABI: {}", e)))?;
        let collection_abi: Abi = serde_json::from_str(ERC721_ABI_JSON)
            .map_err(|e| AppError::Abi(format!("Invalid ERC-721 ABI: {}", e)))?;

        Ok(Self {
            default_network: resolve_default_network(config.name_trade_network.as_deref()),
            mainnet: NetworkTarget {
                contract_address: normalize_address(&config.mainnet_contract_address)?,
                default_rpc_url: config.base_mainnet_rpc_url.clone(),
                chain_id: BASE_MAINNET_CHAIN_ID,
                chain_name: BASE_MAINNET_CHAIN_NAME,
                explorer_url: BASE_MAINNET_EXPLORER_URL,
            },
            testnet: NetworkTarget {
                contract_address: normalize_address(&config.testnet_contract_address)?,
                default_rpc_url: config.base_sepolia_rpc_url.clone(),
                chain_id: BASE_SEPOLIA_CHAIN_ID,
                chain_name: BASE_SEPOLIA_CHAIN_NAME,
                explorer_url: BASE_SEPOLIA_EXPLORER_URL,
            },
            abi: Arc::new(abi),
            collection_abi: Arc::new(collection_abi),
            resolved: RwLock::new(HashMap::new()),
        })
    }

    pub fn default_network(&self) -> Network {
        self.default_network
    }

    pub fn network_for(&self, options: &ResolveOptions) -> Network {
        options.network.unwrap_or(self.default_network)
    }

    pub fn resolve(&self, options: &ResolveOptions) -> Arc<ContractConfig> {
        let network = self.network_for(options);
        let target = match network {
            Network::Mainnet => &self.mainnet,
            Network::Testnet => &self.testnet,
        };
        let rpc_url = options
            .rpc_url_override
            .clone()
            .unwrap_or_else(|| target.default_rpc_url.clone());
        let key = client_cache_key(network, &rpc_url);

        if let Some(existing) = self
            .resolved
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
        {
            return existing.clone();
        }

        let config = Arc::new(ContractConfig {
            network,
            contract_address: target.contract_address,
            abi: self.abi.clone(),
            collection_abi: self.collection_abi.clone(),
            chain: ChainDescriptor {
                id: target.chain_id,
                name: target.chain_name.to_string(),
                native_currency: NativeCurrency {
                    name: NATIVE_CURRENCY_NAME.to_string(),
                    symbol: NATIVE_CURRENCY_SYMBOL.to_string(),
                    decimals: NATIVE_CURRENCY_DECIMALS,
                },
                rpc_url: rpc_url.clone(),
                block_explorer_url: Some(target.explorer_url.to_string()),
            },
            rpc_url,
        });

        let mut guard = self
            .resolved
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.entry(key).or_insert(config).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ContractResolver {
        ContractResolver::from_config(&Config::for_tests()).expect("resolver")
    }

    #[test]
    fn default_network_requires_exact_mainnet() {
        assert_eq!(resolve_default_network(Some("mainnet")), Network::Mainnet);
        assert_eq!(resolve_default_network(Some("MAINNET")), Network::Testnet);
        assert_eq!(resolve_default_network(Some("base")), Network::Testnet);
        assert_eq!(resolve_default_network(None), Network::Testnet);
    }

    #[test]
    fn mainnet_and_testnet_resolve_to_distinct_targets() {
        let resolver = resolver();
        let mainnet = resolver.resolve(&ResolveOptions::for_network(Network::Mainnet));
        let testnet = resolver.resolve(&ResolveOptions::for_network(Network::Testnet));
        assert_ne!(mainnet.contract_address, testnet.contract_address);
        assert_ne!(mainnet.chain.id, testnet.chain.id);
        assert_eq!(mainnet.chain.id, BASE_MAINNET_CHAIN_ID);
        assert_eq!(testnet.chain.id, BASE_SEPOLIA_CHAIN_ID);
    }

    #[test]
    fn resolution_is_deterministic_and_memoized() {
        let resolver = resolver();
        let options = ResolveOptions::for_network(Network::Testnet);
        let first = resolver.resolve(&options);
        let second = resolver.resolve(&options);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.contract_address, second.contract_address);
        assert_eq!(first.chain, second.chain);

        let fresh = ContractResolver::from_config(&Config::for_tests()).unwrap();
        let third = fresh.resolve(&options);
        assert_eq!(first.contract_address, third.contract_address);
        assert_eq!(first.rpc_url, third.rpc_url);
        assert_eq!(first.chain, third.chain);
    }

    #[test]
    fn rpc_override_changes_cache_key() {
        let resolver = resolver();
        let default = resolver.resolve(&ResolveOptions::for_network(Network::Testnet));
        let overridden = resolver.resolve(&ResolveOptions {
            network: Some(Network::Testnet),
            rpc_url_override: Some("http://localhost:8545".to_string()),
        });
        assert_eq!(overridden.rpc_url, "http://localhost:8545");
        assert_eq!(overridden.chain.rpc_url, "http://localhost:8545");
        assert_ne!(default.cache_key(), overridden.cache_key());
        assert_eq!(overridden.cache_key(), "testnet:http://localhost:8545");
    }

    #[test]
    fn abi_exposes_marketplace_functions() {
        let config = resolver().resolve(&ResolveOptions::default());
        for name in ["buy", "list", "getListing", "getOffer", "getAllActiveAuctions"] {
            assert!(config.abi.function(name).is_ok(), "missing {}", name);
        }
        assert!(config.collection_abi.function("setApprovalForAll").is_ok());
    }

    #[test]
    fn chain_id_hex_is_lowercase_prefixed() {
        let config = resolver().resolve(&ResolveOptions::for_network(Network::Mainnet));
        assert_eq!(config.chain.id_hex(), "0x2105");
    }
}
