use serde::Deserialize;
use std::env;

use crate::constants::{
    CHAIN_SWITCH_POLL_ATTEMPTS_DEFAULT, CHAIN_SWITCH_POLL_INTERVAL_MS_DEFAULT,
    DEFAULT_BASE_MAINNET_RPC_URL, DEFAULT_BASE_SEPOLIA_RPC_URL, DEFAULT_COLLECTION_ITEMS_ENDPOINT,
    DEFAULT_COLLECTION_SLUG, DEFAULT_TESTNET_CONTRACT_ADDRESS, QUERY_CACHE_TTL_SECS_DEFAULT,
    RECEIPT_POLL_ATTEMPTS_DEFAULT, RECEIPT_POLL_INTERVAL_MS_DEFAULT,
};
use crate::services::normalizer::normalize_address;
use crate::utils::env_parse_positive;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Network selection
    pub name_trade_network: Option<String>,

    // Blockchain
    pub base_mainnet_rpc_url: String,
    pub base_sepolia_rpc_url: String,

    // Contract Addresses
    pub mainnet_contract_address: String,
    pub testnet_contract_address: String,

    // Wallet (EIP-1193 over JSON-RPC)
    pub wallet_rpc_url: Option<String>,

    // Query cache
    pub redis_url: Option<String>,
    pub query_cache_ttl_secs: u64,

    // Chain switch / receipt polling
    pub chain_switch_poll_attempts: usize,
    pub chain_switch_poll_interval_ms: u64,
    pub receipt_poll_attempts: usize,
    pub receipt_poll_interval_ms: u64,

    // Display-name lookup
    pub collection_items_endpoint: String,
    pub collection_slug: String,

    // CORS
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            name_trade_network: env::var("NAME_TRADE_NETWORK").ok(),

            base_mainnet_rpc_url: env::var("BASE_MAINNET_RPC_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_MAINNET_RPC_URL.to_string()),
            base_sepolia_rpc_url: env::var("BASE_SEPOLIA_RPC_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_SEPOLIA_RPC_URL.to_string()),

            mainnet_contract_address: env::var("NAME_TRADE_MAINNET_CONTRACT_ADDRESS")?,
            testnet_contract_address: env::var("NAME_TRADE_TESTNET_CONTRACT_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_TESTNET_CONTRACT_ADDRESS.to_string()),

            wallet_rpc_url: env::var("WALLET_RPC_URL")
                .ok()
                .filter(|value| !value.trim().is_empty()),

            redis_url: env::var("REDIS_URL")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            query_cache_ttl_secs: env_parse_positive(
                "QUERY_CACHE_TTL_SECS",
                QUERY_CACHE_TTL_SECS_DEFAULT,
            ),

            chain_switch_poll_attempts: env_parse_positive(
                "CHAIN_SWITCH_POLL_ATTEMPTS",
                CHAIN_SWITCH_POLL_ATTEMPTS_DEFAULT,
            ),
            chain_switch_poll_interval_ms: env_parse_positive(
                "CHAIN_SWITCH_POLL_INTERVAL_MS",
                CHAIN_SWITCH_POLL_INTERVAL_MS_DEFAULT,
            ),
            receipt_poll_attempts: env_parse_positive(
                "RECEIPT_POLL_ATTEMPTS",
                RECEIPT_POLL_ATTEMPTS_DEFAULT,
            ),
            receipt_poll_interval_ms: env_parse_positive(
                "RECEIPT_POLL_INTERVAL_MS",
                RECEIPT_POLL_INTERVAL_MS_DEFAULT,
            ),

            collection_items_endpoint: env::var("COLLECTION_ITEMS_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_COLLECTION_ITEMS_ENDPOINT.to_string()),
            collection_slug: env::var("COLLECTION_SLUG")
                .unwrap_or_else(|_| DEFAULT_COLLECTION_SLUG.to_string()),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_mainnet_rpc_url.trim().is_empty() {
            anyhow::bail!("BASE_MAINNET_RPC_URL is empty");
        }
        if self.base_sepolia_rpc_url.trim().is_empty() {
            anyhow::bail!("BASE_SEPOLIA_RPC_URL is empty");
        }

        let mainnet = normalize_address(&self.mainnet_contract_address).map_err(|e| {
            anyhow::anyhow!("NAME_TRADE_MAINNET_CONTRACT_ADDRESS is invalid: {}", e)
        })?;
        let testnet = normalize_address(&self.testnet_contract_address).map_err(|e| {
            anyhow::anyhow!("NAME_TRADE_TESTNET_CONTRACT_ADDRESS is invalid: {}", e)
        })?;
        if mainnet == testnet {
            anyhow::bail!("Mainnet and testnet contract addresses must differ");
        }
        if self.mainnet_contract_address.starts_with("0x0000") {
            tracing::warn!("Using placeholder mainnet contract address");
        }

        if self.wallet_rpc_url.is_none() {
            tracing::warn!("WALLET_RPC_URL is not set; write endpoints will report an unavailable wallet");
        }
        if self.redis_url.is_none() {
            tracing::info!("REDIS_URL is not set; using in-memory query cache");
        }

        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            name_trade_network: None,
            base_mainnet_rpc_url: DEFAULT_BASE_MAINNET_RPC_URL.to_string(),
            base_sepolia_rpc_url: DEFAULT_BASE_SEPOLIA_RPC_URL.to_string(),
            mainnet_contract_address: "0x1111111111111111111111111111111111111111".to_string(),
            testnet_contract_address: DEFAULT_TESTNET_CONTRACT_ADDRESS.to_string(),
            wallet_rpc_url: None,
            redis_url: None,
            query_cache_ttl_secs: QUERY_CACHE_TTL_SECS_DEFAULT,
            chain_switch_poll_attempts: 3,
            chain_switch_poll_interval_ms: 1,
            receipt_poll_attempts: 2,
            receipt_poll_interval_ms: 1,
            collection_items_endpoint: DEFAULT_COLLECTION_ITEMS_ENDPOINT.to_string(),
            collection_slug: DEFAULT_COLLECTION_SLUG.to_string(),
            cors_allowed_origins: "*".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_test_config() {
        assert!(Config::for_tests().validate().is_ok());
    }

    #[test]
    fn validate_rejects_shared_contract_address() {
        let mut config = Config::for_tests();
        config.mainnet_contract_address = config.testnet_contract_address.to_lowercase();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_malformed_address() {
        let mut config = Config::for_tests();
        config.mainnet_contract_address = "0x1234".to_string();
        assert!(config.validate().is_err());
    }
}
