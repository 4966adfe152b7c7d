use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::{
    config::Config,
    error::Result,
    integrations::{EthersReadClient, JsonRpcWallet, ReadClient, ReceiptPolicy, WalletClient},
};

use super::contract_config::{ContractConfig, ContractResolver, Network, ResolveOptions};

/// Creates fresh client handles for a resolved contract target.
pub trait ClientFactory: Send + Sync {
    fn read_client(&self, config: &ContractConfig) -> Result<Arc<dyn ReadClient>>;

    /// `None` when no wallet provider is available.
    fn wallet_client(&self, config: &ContractConfig) -> Option<Arc<dyn WalletClient>>;
}

pub struct HttpClientFactory {
    wallet_rpc_url: Option<String>,
    receipt_policy: ReceiptPolicy,
}

impl HttpClientFactory {
    pub fn from_config(config: &Config) -> Self {
        Self {
            wallet_rpc_url: config.wallet_rpc_url.clone(),
            receipt_policy: ReceiptPolicy::from_config(config),
        }
    }
}

impl ClientFactory for HttpClientFactory {
    fn read_client(&self, config: &ContractConfig) -> Result<Arc<dyn ReadClient>> {
        let client = EthersReadClient::new(&config.rpc_url, self.receipt_policy)?;
        Ok(Arc::new(client))
    }

    fn wallet_client(&self, _config: &ContractConfig) -> Option<Arc<dyn WalletClient>> {
        self.wallet_rpc_url
            .as_ref()
            .map(|url| Arc::new(JsonRpcWallet::new(url.clone())) as Arc<dyn WalletClient>)
    }
}

/// Memoized read and wallet handles, keyed by `${network}:${rpcUrl}`.
pub struct ClientRegistry {
    resolver: ContractResolver,
    factory: Box<dyn ClientFactory>,
    read_clients: RwLock<HashMap<String, Arc<dyn ReadClient>>>,
    wallet_clients: RwLock<HashMap<String, Arc<dyn WalletClient>>>,
}

impl ClientRegistry {
    pub fn new(resolver: ContractResolver, factory: Box<dyn ClientFactory>) -> Self {
        Self {
            resolver,
            factory,
            read_clients: RwLock::new(HashMap::new()),
            wallet_clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_network(&self) -> Network {
        self.resolver.default_network()
    }

    pub fn contract_config(&self, options: &ResolveOptions) -> Arc<ContractConfig> {
        self.resolver.resolve(options)
    }

    pub fn read_client(&self, options: &ResolveOptions) -> Result<Arc<dyn ReadClient>> {
        let config = self.resolver.resolve(options);
        let key = config.cache_key();

        if let Some(existing) = self
            .read_clients
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
        {
            return Ok(existing.clone());
        }

        let client = self.factory.read_client(&config)?;
        let mut guard = self
            .read_clients
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.entry(key).or_insert(client).clone())
    }

    pub fn wallet_client(&self, options: &ResolveOptions) -> Option<Arc<dyn WalletClient>> {
        let config = self.resolver.resolve(options);
        let key = config.cache_key();

        if let Some(existing) = self
            .wallet_clients
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
        {
            return Some(existing.clone());
        }

        let client = self.factory.wallet_client(&config)?;
        let mut guard = self
            .wallet_clients
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(guard.entry(key).or_insert(client).clone())
    }

    /// Drops the memoized wallet handle and creates a new one.
    pub fn refresh_wallet_client(&self, options: &ResolveOptions) -> Option<Arc<dyn WalletClient>> {
        let config = self.resolver.resolve(options);
        let key = config.cache_key();
        let fresh = self.factory.wallet_client(&config);

        let mut guard = self
            .wallet_clients
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match &fresh {
            Some(client) => {
                guard.insert(key, client.clone());
            }
            None => {
                guard.remove(&key);
            }
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(wallet_rpc_url: Option<&str>) -> ClientRegistry {
        let mut config = Config::for_tests();
        config.wallet_rpc_url = wallet_rpc_url.map(str::to_string);
        ClientRegistry::new(
            ContractResolver::from_config(&config).unwrap(),
            Box::new(HttpClientFactory::from_config(&config)),
        )
    }

    #[test]
    fn read_clients_are_memoized_per_key() {
        let registry = registry(None);
        let testnet = ResolveOptions::for_network(Network::Testnet);
        let first = registry.read_client(&testnet).unwrap();
        let second = registry.read_client(&testnet).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let mainnet = registry
            .read_client(&ResolveOptions::for_network(Network::Mainnet))
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &mainnet));
    }

    #[test]
    fn missing_wallet_provider_is_none() {
        let registry = registry(None);
        assert!(registry.wallet_client(&ResolveOptions::default()).is_none());
        assert!(registry
            .refresh_wallet_client(&ResolveOptions::default())
            .is_none());
    }

    #[test]
    fn refresh_replaces_memoized_wallet() {
        let registry = registry(Some("http://127.0.0.1:8545"));
        let options = ResolveOptions::default();
        let first = registry.wallet_client(&options).unwrap();
        assert!(Arc::ptr_eq(&first, &registry.wallet_client(&options).unwrap()));

        let refreshed = registry.refresh_wallet_client(&options).unwrap();
        assert!(!Arc::ptr_eq(&first, &refreshed));
        assert!(Arc::ptr_eq(&refreshed, &registry.wallet_client(&options).unwrap()));
    }
}
