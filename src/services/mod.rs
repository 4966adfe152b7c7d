// All service modules
pub mod approval;
pub mod cache_keys;
pub mod clients;
pub mod contract_config;
pub mod decoder;
pub mod mutations;
pub mod normalizer;
pub mod query_cache;
pub mod trade_reader;
pub mod write_pipeline;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export for convenience
pub use clients::{ClientRegistry, HttpClientFactory};
pub use contract_config::{ContractResolver, Network, ResolveOptions};
pub use query_cache::{MemoryQueryCache, QueryCache, RedisQueryCache};
pub use trade_reader::TradeReader;
pub use write_pipeline::{ChainSwitchPolicy, WritePipeline, WriteResult};

use crate::{config::Config, integrations::NameLookup};
use std::sync::Arc;
use std::time::Duration;

/// Shared service graph handed to the HTTP layer.
pub struct Services {
    pub registry: Arc<ClientRegistry>,
    pub cache: Arc<dyn QueryCache>,
    pub pipeline: Arc<WritePipeline>,
    pub reader: Arc<TradeReader>,
}

/// Redis when `REDIS_URL` is set and reachable, in-memory otherwise.
pub async fn build_query_cache(config: &Config) -> Arc<dyn QueryCache> {
    if let Some(url) = &config.redis_url {
        match RedisQueryCache::connect(url, config.query_cache_ttl_secs).await {
            Ok(cache) => {
                tracing::info!("Query cache: redis");
                return Arc::new(cache);
            }
            Err(e) => {
                tracing::warn!("Redis unavailable ({}); falling back to in-memory query cache", e);
            }
        }
    }
    tracing::info!("Query cache: memory (ttl {}s)", config.query_cache_ttl_secs);
    Arc::new(MemoryQueryCache::new(Duration::from_secs(
        config.query_cache_ttl_secs,
    )))
}

/// Wires resolver, client registry, cache, pipeline and reader.
pub async fn build_services(config: &Config) -> crate::error::Result<Services> {
    tracing::info!("Starting name-trade services...");

    let resolver = ContractResolver::from_config(config)?;
    tracing::info!("Default network: {}", resolver.default_network());

    let registry = Arc::new(ClientRegistry::new(
        resolver,
        Box::new(HttpClientFactory::from_config(config)),
    ));
    let cache = build_query_cache(config).await;
    let pipeline = Arc::new(WritePipeline::new(
        registry.clone(),
        cache.clone(),
        ChainSwitchPolicy::from_config(config),
    ));
    let reader = Arc::new(TradeReader::new(
        registry.clone(),
        cache.clone(),
        NameLookup::from_config(config),
    ));

    Ok(Services {
        registry,
        cache,
        pipeline,
        reader,
    })
}
