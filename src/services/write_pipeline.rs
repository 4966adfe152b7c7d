//! Write-mutation pipeline.
//!
//! A mutation is described once as a [`WriteRequest`] and executed by
//! [`WritePipeline::execute`], which runs the same sequence for every
//! marketplace write:
//!
//! 1. build arguments and value from the caller's variables
//! 2. acquire the wallet for the target network
//! 3. make sure the wallet is on the target chain (switch, add, poll, refresh)
//! 4. resolve the sending account
//! 5. submit the contract write
//! 6. hand back the hash together with a lazy receipt wait
//! 7. invalidate the affected query keys

use ethers::abi::{Abi, Token};
use ethers::types::{Address, TransactionReceipt, H256, U256};
use futures_util::future::join_all;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::{
    config::Config,
    error::{AppError, Result},
    integrations::{ContractCall, ReadClient, WalletClient, WalletError},
};

use super::cache_keys::QueryKey;
use super::clients::ClientRegistry;
use super::contract_config::{ChainDescriptor, ContractConfig, ResolveOptions};
use super::normalizer::checksum;
use super::query_cache::QueryCache;

type ArgsBuilder<V> = Box<dyn Fn(&V) -> Result<Vec<Token>> + Send + Sync>;
type ValueBuilder<V> = Box<dyn Fn(&V) -> Result<Option<U256>> + Send + Sync>;
type AddressBuilder<V> = Box<dyn Fn(&V) -> Result<Address> + Send + Sync>;
type InvalidationBuilder<V> =
    Box<dyn Fn(&V, &ContractConfig, &WriteResult) -> Result<Vec<QueryKey>> + Send + Sync>;

/// Contract a write is sent to.
pub enum WriteTarget<V> {
    /// The marketplace contract of the resolved network.
    Marketplace,
    /// An ERC-721 collection whose address comes from the variables.
    Collection(AddressBuilder<V>),
}

pub struct WriteRequest<V> {
    function_name: &'static str,
    target: WriteTarget<V>,
    args: ArgsBuilder<V>,
    value: Option<ValueBuilder<V>>,
    invalidation: Option<InvalidationBuilder<V>>,
}

impl<V> WriteRequest<V> {
    pub fn marketplace(
        function_name: &'static str,
        args: impl Fn(&V) -> Result<Vec<Token>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            function_name,
            target: WriteTarget::Marketplace,
            args: Box::new(args),
            value: None,
            invalidation: None,
        }
    }

    pub fn collection(
        function_name: &'static str,
        collection: impl Fn(&V) -> Result<Address> + Send + Sync + 'static,
        args: impl Fn(&V) -> Result<Vec<Token>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            function_name,
            target: WriteTarget::Collection(Box::new(collection)),
            args: Box::new(args),
            value: None,
            invalidation: None,
        }
    }

    pub fn with_value(
        mut self,
        value: impl Fn(&V) -> Result<Option<U256>> + Send + Sync + 'static,
    ) -> Self {
        self.value = Some(Box::new(value));
        self
    }

    pub fn invalidates(
        mut self,
        keys: impl Fn(&V, &ContractConfig, &WriteResult) -> Result<Vec<QueryKey>> + Send + Sync + 'static,
    ) -> Self {
        self.invalidation = Some(Box::new(keys));
        self
    }

    pub fn function_name(&self) -> &'static str {
        self.function_name
    }
}

/// Hash of a submitted write plus a receipt wait that only runs when awaited.
#[derive(Clone)]
pub struct WriteResult {
    pub hash: H256,
    reader: Arc<dyn ReadClient>,
}

impl WriteResult {
    pub fn new(hash: H256, reader: Arc<dyn ReadClient>) -> Self {
        Self { hash, reader }
    }

    pub fn hash_hex(&self) -> String {
        format!("{:#x}", self.hash)
    }

    pub async fn wait_for_receipt(&self) -> Result<TransactionReceipt> {
        self.reader.wait_for_transaction_receipt(self.hash).await
    }
}

impl fmt::Debug for WriteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteResult")
            .field("hash", &self.hash_hex())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSwitchPolicy {
    pub poll_attempts: usize,
    pub poll_interval: Duration,
}

impl ChainSwitchPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_attempts: config.chain_switch_poll_attempts,
            poll_interval: Duration::from_millis(config.chain_switch_poll_interval_ms),
        }
    }
}

struct PreparedCall {
    config: Arc<ContractConfig>,
    address: Address,
    abi: Arc<Abi>,
    args: Vec<Token>,
    value: Option<U256>,
    reader: Arc<dyn ReadClient>,
}

pub struct WritePipeline {
    registry: Arc<ClientRegistry>,
    cache: Arc<dyn QueryCache>,
    policy: ChainSwitchPolicy,
}

impl WritePipeline {
    pub fn new(
        registry: Arc<ClientRegistry>,
        cache: Arc<dyn QueryCache>,
        policy: ChainSwitchPolicy,
    ) -> Self {
        Self {
            registry,
            cache,
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub async fn execute<V: Send + Sync>(
        &self,
        request: &WriteRequest<V>,
        variables: V,
        options: &ResolveOptions,
    ) -> Result<WriteResult> {
        let prepared = self.prepare(request, &variables, options)?;

        let wallet = self
            .registry
            .wallet_client(options)
            .ok_or(AppError::WalletUnavailable)?;
        let wallet = self.ensure_chain(wallet, &prepared.config.chain, options).await?;
        let account = resolve_account(wallet.as_ref()).await?;

        let call = ContractCall {
            address: prepared.address,
            abi: prepared.abi,
            function_name: request.function_name.to_string(),
            args: prepared.args,
            account,
            chain_id: prepared.config.chain.id,
            value: prepared.value,
        };
        tracing::debug!(
            "Submitting {} to {} on {} from {}",
            request.function_name,
            checksum(&call.address),
            prepared.config.network,
            checksum(&account)
        );
        let hash = wallet.write_contract(&call).await.map_err(|e| {
            tracing::warn!("{} submission failed: {}", request.function_name, e);
            AppError::from(e)
        })?;

        let result = WriteResult::new(hash, prepared.reader);
        tracing::info!("{} submitted: {}", request.function_name, result.hash_hex());

        if let Some(invalidation) = &request.invalidation {
            match invalidation(&variables, &prepared.config, &result) {
                Ok(keys) => self.invalidate_all(keys).await,
                Err(e) => tracing::warn!(
                    "Skipping cache invalidation for {}: {}",
                    request.function_name,
                    e
                ),
            }
        }

        Ok(result)
    }

    /// Runs `execute`; on a chain mismatch forces one switch and runs it once more.
    pub async fn execute_with_chain_retry<V: Clone + Send + Sync>(
        &self,
        request: &WriteRequest<V>,
        variables: V,
        options: &ResolveOptions,
    ) -> Result<WriteResult> {
        match self.execute(request, variables.clone(), options).await {
            Err(err) if err.kind().needs_chain_switch() => {
                tracing::warn!("{}; switching chain and retrying {}", err, request.function_name);
                self.switch_to_target_chain(options).await?;
                self.execute(request, variables, options).await
            }
            other => other,
        }
    }

    /// Unconditionally asks the wallet to move to the target chain.
    pub async fn switch_to_target_chain(&self, options: &ResolveOptions) -> Result<()> {
        let config = self.registry.contract_config(options);
        let wallet = self
            .registry
            .wallet_client(options)
            .ok_or(AppError::WalletUnavailable)?;
        self.switch_chain(wallet.as_ref(), &config.chain).await?;
        self.poll_chain(wallet.as_ref(), config.chain.id).await;
        self.registry
            .refresh_wallet_client(options)
            .ok_or(AppError::WalletUnavailable)?;
        Ok(())
    }

    fn prepare<V>(
        &self,
        request: &WriteRequest<V>,
        variables: &V,
        options: &ResolveOptions,
    ) -> Result<PreparedCall> {
        let config = self.registry.contract_config(options);
        let (address, abi) = match &request.target {
            WriteTarget::Marketplace => (config.contract_address, config.abi.clone()),
            WriteTarget::Collection(collection) => (collection(variables)?, config.collection_abi.clone()),
        };
        abi.function(request.function_name)
            .map_err(|e| AppError::Abi(format!("{}: {}", request.function_name, e)))?;

        let args = (request.args)(variables)?;
        let value = match &request.value {
            Some(value) => value(variables)?,
            None => None,
        };
        let reader = self.registry.read_client(options)?;

        Ok(PreparedCall {
            config,
            address,
            abi,
            args,
            value,
            reader,
        })
    }

    async fn ensure_chain(
        &self,
        wallet: Arc<dyn WalletClient>,
        chain: &ChainDescriptor,
        options: &ResolveOptions,
    ) -> Result<Arc<dyn WalletClient>> {
        let current = wallet.chain_id().await?;
        if current == chain.id {
            return Ok(wallet);
        }

        tracing::info!("Wallet on chain {}, switching to {} ({})", current, chain.name, chain.id);
        self.switch_chain(wallet.as_ref(), chain).await?;
        self.poll_chain(wallet.as_ref(), chain.id).await;

        let refreshed = self
            .registry
            .refresh_wallet_client(options)
            .ok_or(AppError::WalletUnavailable)?;
        match refreshed.chain_id().await {
            Ok(id) if id == chain.id => Ok(refreshed),
            _ => Err(AppError::ChainMismatch {
                chain_name: chain.name.clone(),
            }),
        }
    }

    async fn switch_chain(&self, wallet: &dyn WalletClient, chain: &ChainDescriptor) -> Result<()> {
        let mismatch = || AppError::ChainMismatch {
            chain_name: chain.name.clone(),
        };

        match wallet.switch_chain(chain.id).await {
            Ok(()) => Ok(()),
            Err(WalletError::UnrecognizedChain(_)) => {
                tracing::info!("Wallet does not know chain {}, adding it", chain.id);
                wallet.add_chain(chain).await?;
                wallet.switch_chain(chain.id).await.map_err(|e| {
                    tracing::warn!("Switch after add failed: {}", e);
                    mismatch()
                })
            }
            Err(e) => {
                tracing::warn!("Chain switch to {} failed: {}", chain.id, e);
                Err(mismatch())
            }
        }
    }

    /// Waits for the wallet to report `target`; read failures count as misses.
    async fn poll_chain(&self, wallet: &dyn WalletClient, target: u64) {
        for attempt in 0..self.policy.poll_attempts {
            if let Ok(id) = wallet.chain_id().await {
                if id == target {
                    return;
                }
            }
            if attempt + 1 < self.policy.poll_attempts {
                sleep(self.policy.poll_interval).await;
            }
        }
        tracing::debug!("Chain {} not reported after {} polls", target, self.policy.poll_attempts);
    }

    async fn invalidate_all(&self, keys: Vec<QueryKey>) {
        let results = join_all(keys.iter().map(|key| self.cache.invalidate(key))).await;
        for (key, result) in keys.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!("Failed to invalidate {} on {}: {}", key, self.cache.backend(), e);
            }
        }
    }
}

/// Connected accounts first, then an explicit request; the first address sends.
pub async fn resolve_account(wallet: &dyn WalletClient) -> Result<Address> {
    let mut addresses = wallet.get_addresses().await?;
    if addresses.is_empty() {
        addresses = wallet.request_addresses().await?;
    }
    addresses.into_iter().next().ok_or(AppError::NoAccount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{BASE_MAINNET_CHAIN_ID, BASE_SEPOLIA_CHAIN_ID};
    use crate::services::cache_keys::{token_key, OP_GET_LISTING, OP_LISTINGS};
    use crate::services::contract_config::Network;
    use crate::services::test_support::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct Harness {
        pipeline: WritePipeline,
        wallet: Arc<MockWallet>,
        reader: Arc<MockReadClient>,
        factory: MockFactory,
        cache: Arc<RecordingCache>,
        log: EventLog,
    }

    fn harness(chain: u64, accounts: Vec<Address>) -> Harness {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let wallet = Arc::new(MockWallet::new(chain, accounts, log.clone()));
        let reader = Arc::new(MockReadClient::unreachable());
        let factory = MockFactory {
            wallet: Some(wallet.clone()),
            reader: reader.clone(),
            wallet_creations: Arc::new(AtomicUsize::new(0)),
        };
        let cache = Arc::new(RecordingCache::new(log.clone()));
        let pipeline = WritePipeline::new(
            registry_with(factory.clone()),
            cache.clone(),
            ChainSwitchPolicy::from_config(&Config::for_tests()),
        );
        Harness {
            pipeline,
            wallet,
            reader,
            factory,
            cache,
            log,
        }
    }

    #[derive(Clone)]
    struct BuyVars {
        nft: Address,
        token_id: U256,
        price: U256,
    }

    fn buy_request() -> WriteRequest<BuyVars> {
        WriteRequest::marketplace("buy", |v: &BuyVars| {
            Ok(vec![Token::Address(v.nft), Token::Uint(v.token_id)])
        })
        .with_value(|v: &BuyVars| Ok(Some(v.price)))
        .invalidates(|v: &BuyVars, config: &ContractConfig, _result: &WriteResult| {
            Ok(vec![
                token_key(config.network, OP_GET_LISTING, &v.nft, &v.token_id),
                token_key(config.network, OP_LISTINGS, &v.nft, &v.token_id),
            ])
        })
    }

    fn buy_vars() -> BuyVars {
        BuyVars {
            nft: Address::repeat_byte(0xaa),
            token_id: U256::from(42u64),
            price: U256::exp10(18),
        }
    }

    fn testnet() -> ResolveOptions {
        ResolveOptions::for_network(Network::Testnet)
    }

    #[tokio::test]
    async fn correct_chain_skips_switch() {
        let h = harness(BASE_SEPOLIA_CHAIN_ID, vec![Address::repeat_byte(0x01)]);
        h.pipeline
            .execute(&buy_request(), buy_vars(), &testnet())
            .await
            .unwrap();
        assert_eq!(h.wallet.count("switch_chain"), 0);
        assert_eq!(h.wallet.count("add_chain"), 0);
        assert_eq!(h.factory.wallet_creations(), 1);
    }

    #[tokio::test]
    async fn switching_chain_refreshes_wallet_exactly_once() {
        let h = harness(BASE_MAINNET_CHAIN_ID, vec![Address::repeat_byte(0x01)]);
        h.pipeline
            .execute(&buy_request(), buy_vars(), &testnet())
            .await
            .unwrap();
        assert_eq!(h.wallet.count("switch_chain"), 1);
        assert_eq!(h.factory.wallet_creations(), 2);
        assert_eq!(h.wallet.writes.lock().unwrap()[0].chain_id, BASE_SEPOLIA_CHAIN_ID);
    }

    #[tokio::test]
    async fn unknown_chain_is_added_then_switched() {
        let h = harness(BASE_MAINNET_CHAIN_ID, vec![Address::repeat_byte(0x01)]);
        *h.wallet.switch_error.lock().unwrap() =
            Some(WalletError::UnrecognizedChain("Unrecognized chain ID".into()));

        h.pipeline
            .execute(&buy_request(), buy_vars(), &testnet())
            .await
            .unwrap();

        let log = events(&h.log);
        let add = log.iter().position(|e| e.starts_with("add_chain")).unwrap();
        let second_switch = log.iter().rposition(|e| e.starts_with("switch_chain")).unwrap();
        assert!(add < second_switch);
        assert_eq!(h.wallet.count("switch_chain"), 2);
    }

    #[tokio::test]
    async fn rejected_switch_reports_chain_mismatch_without_writing() {
        let h = harness(BASE_MAINNET_CHAIN_ID, vec![Address::repeat_byte(0x01)]);
        *h.wallet.switch_error.lock().unwrap() = Some(WalletError::UserRejected("no".into()));

        let err = h
            .pipeline
            .execute(&buy_request(), buy_vars(), &testnet())
            .await
            .unwrap_err();
        assert!(err.kind().needs_chain_switch());
        assert_eq!(err.to_string(), "Switch your wallet to the Base Sepolia network to continue.");
        assert_eq!(h.wallet.count("write_contract"), 0);
    }

    #[tokio::test]
    async fn wallet_that_never_switches_is_a_mismatch_after_polling() {
        let h = harness(BASE_MAINNET_CHAIN_ID, vec![Address::repeat_byte(0x01)]);
        *h.wallet.switch_applies.lock().unwrap() = false;

        let err = h
            .pipeline
            .execute(&buy_request(), buy_vars(), &testnet())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ChainMismatch { .. }));
        // initial read + 3 polls + post-refresh check
        assert_eq!(h.wallet.count("chain_id"), 5);
        assert_eq!(h.factory.wallet_creations(), 2);
        assert_eq!(h.wallet.count("write_contract"), 0);
    }

    #[tokio::test]
    async fn zero_addresses_request_then_fail_without_write() {
        let h = harness(BASE_SEPOLIA_CHAIN_ID, vec![]);
        let err = h
            .pipeline
            .execute(&buy_request(), buy_vars(), &testnet())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoAccount));
        assert_eq!(h.wallet.count("request_addresses"), 1);
        assert_eq!(h.wallet.count("write_contract"), 0);
        assert!(h.cache.keys().is_empty());
    }

    #[tokio::test]
    async fn requested_address_is_used_when_none_connected() {
        let h = harness(BASE_SEPOLIA_CHAIN_ID, vec![]);
        *h.wallet.requested_accounts.lock().unwrap() = vec![Address::repeat_byte(0x07)];
        h.pipeline
            .execute(&buy_request(), buy_vars(), &testnet())
            .await
            .unwrap();
        assert_eq!(h.wallet.writes.lock().unwrap()[0].account, Address::repeat_byte(0x07));
    }

    #[tokio::test]
    async fn missing_wallet_is_unavailable() {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let factory = MockFactory {
            wallet: None,
            reader: Arc::new(MockReadClient::unreachable()),
            wallet_creations: Arc::new(AtomicUsize::new(0)),
        };
        let pipeline = WritePipeline::new(
            registry_with(factory),
            Arc::new(RecordingCache::new(log)),
            ChainSwitchPolicy::from_config(&Config::for_tests()),
        );
        let err = pipeline
            .execute(&buy_request(), buy_vars(), &testnet())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::WalletUnavailable));
        assert_eq!(
            err.to_string(),
            "Wallet client unavailable. Connect a compatible wallet to continue."
        );
    }

    #[tokio::test]
    async fn build_failure_makes_no_wallet_calls() {
        let h = harness(BASE_SEPOLIA_CHAIN_ID, vec![Address::repeat_byte(0x01)]);
        let request: WriteRequest<()> = WriteRequest::marketplace("buy", |_: &()| {
            Err(AppError::InvalidAddress("0x123".into()))
        });
        let err = h.pipeline.execute(&request, (), &testnet()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidAddress(_)));
        assert!(events(&h.log).is_empty());
    }

    #[tokio::test]
    async fn unknown_function_is_rejected_before_wallet() {
        let h = harness(BASE_SEPOLIA_CHAIN_ID, vec![Address::repeat_byte(0x01)]);
        let request: WriteRequest<()> = WriteRequest::marketplace("mint", |_: &()| Ok(vec![]));
        let err = h.pipeline.execute(&request, (), &testnet()).await.unwrap_err();
        assert!(matches!(err, AppError::Abi(_)));
        assert!(events(&h.log).is_empty());
    }

    #[tokio::test]
    async fn user_rejection_passes_through_without_invalidation() {
        let h = harness(BASE_SEPOLIA_CHAIN_ID, vec![Address::repeat_byte(0x01)]);
        *h.wallet.write_error.lock().unwrap() = Some(WalletError::UserRejected("denied".into()));
        let err = h
            .pipeline
            .execute(&buy_request(), buy_vars(), &testnet())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UserRejected(_)));
        assert!(h.cache.keys().is_empty());
    }

    #[tokio::test]
    async fn hash_is_returned_and_receipt_is_lazy() {
        let h = harness(BASE_SEPOLIA_CHAIN_ID, vec![Address::repeat_byte(0x01)]);
        let result = h
            .pipeline
            .execute(&buy_request(), buy_vars(), &testnet())
            .await
            .unwrap();
        assert_eq!(result.hash, H256::from(TEST_TX_HASH));
        assert!(h.reader.receipt_requests.lock().unwrap().is_empty());

        let receipt = result.wait_for_receipt().await.unwrap();
        assert_eq!(receipt.transaction_hash, result.hash);
        assert_eq!(*h.reader.receipt_requests.lock().unwrap(), vec![result.hash]);
    }

    #[tokio::test]
    async fn every_key_is_invalidated_after_submission() {
        let h = harness(BASE_SEPOLIA_CHAIN_ID, vec![Address::repeat_byte(0x01)]);
        h.pipeline
            .execute(&buy_request(), buy_vars(), &testnet())
            .await
            .unwrap();

        let vars = buy_vars();
        let expected = vec![
            token_key(Network::Testnet, OP_GET_LISTING, &vars.nft, &vars.token_id),
            token_key(Network::Testnet, OP_LISTINGS, &vars.nft, &vars.token_id),
        ];
        let invalidated = h.cache.keys();
        assert_eq!(invalidated.len(), expected.len());
        for key in &expected {
            assert!(invalidated.contains(key));
        }

        let log = events(&h.log);
        let write = log.iter().position(|e| e.starts_with("write_contract")).unwrap();
        let first_invalidation = log.iter().position(|e| e.starts_with("invalidate:")).unwrap();
        assert!(write < first_invalidation);
    }

    #[tokio::test]
    async fn end_to_end_buy_sends_value_and_arguments() {
        let h = harness(BASE_SEPOLIA_CHAIN_ID, vec![Address::repeat_byte(0x01)]);
        let result = h
            .pipeline
            .execute(&buy_request(), buy_vars(), &testnet())
            .await
            .unwrap();

        let writes = h.wallet.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        let call = &writes[0];
        assert_eq!(call.function_name, "buy");
        assert_eq!(
            call.args,
            vec![
                Token::Address(Address::repeat_byte(0xaa)),
                Token::Uint(U256::from(42u64))
            ]
        );
        assert_eq!(call.value, Some(U256::from_dec_str("1000000000000000000").unwrap()));
        assert_eq!(call.account, Address::repeat_byte(0x01));
        assert_eq!(call.chain_id, BASE_SEPOLIA_CHAIN_ID);
        assert_eq!(
            call.address,
            h.pipeline.registry().contract_config(&testnet()).contract_address
        );
        assert_eq!(result.hash, H256::from(TEST_TX_HASH));
    }

    #[tokio::test]
    async fn chain_retry_switches_and_reruns_once() {
        let h = harness(BASE_MAINNET_CHAIN_ID, vec![Address::repeat_byte(0x01)]);
        // first switch fails with a generic provider error, forced switch then succeeds
        *h.wallet.switch_error.lock().unwrap() = Some(WalletError::Rpc {
            code: -32002,
            message: "request pending".into(),
        });

        let result = h
            .pipeline
            .execute_with_chain_retry(&buy_request(), buy_vars(), &testnet())
            .await
            .unwrap();
        assert_eq!(result.hash, H256::from(TEST_TX_HASH));
        assert_eq!(h.wallet.count("write_contract"), 1);
    }

    #[tokio::test]
    async fn chain_retry_leaves_other_errors_alone() {
        let h = harness(BASE_SEPOLIA_CHAIN_ID, vec![]);
        let err = h
            .pipeline
            .execute_with_chain_retry(&buy_request(), buy_vars(), &testnet())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoAccount));
        assert_eq!(h.wallet.count("switch_chain"), 0);
    }
}
