//! In-process doubles for the wallet, read client and query cache.

use async_trait::async_trait;
use ethers::abi::{Abi, Token};
use ethers::types::{Address, TransactionReceipt, H256, U64};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    config::Config,
    error::{AppError, Result},
    integrations::{ContractCall, ReadClient, WalletClient, WalletError},
    services::cache_keys::QueryKey,
    services::clients::{ClientFactory, ClientRegistry},
    services::contract_config::{ChainDescriptor, ContractConfig, ContractResolver},
    services::query_cache::QueryCache,
};

pub const TEST_TX_HASH: [u8; 32] = [0x5a; 32];

/// Ordered log shared by the doubles so tests can assert cross-component ordering.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub struct MockWallet {
    pub chain: Mutex<u64>,
    pub accounts: Mutex<Vec<Address>>,
    pub requested_accounts: Mutex<Vec<Address>>,
    /// Returned by the next `switch_chain` instead of switching.
    pub switch_error: Mutex<Option<WalletError>>,
    /// When false a successful `switch_chain` leaves the chain untouched.
    pub switch_applies: Mutex<bool>,
    pub write_error: Mutex<Option<WalletError>>,
    pub writes: Mutex<Vec<ContractCall>>,
    pub log: EventLog,
}

impl MockWallet {
    pub fn new(chain: u64, accounts: Vec<Address>, log: EventLog) -> Self {
        Self {
            chain: Mutex::new(chain),
            accounts: Mutex::new(accounts),
            requested_accounts: Mutex::new(Vec::new()),
            switch_error: Mutex::new(None),
            switch_applies: Mutex::new(true),
            write_error: Mutex::new(None),
            writes: Mutex::new(Vec::new()),
            log,
        }
    }

    fn record(&self, event: impl Into<String>) {
        self.log.lock().unwrap().push(event.into());
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl WalletClient for MockWallet {
    async fn chain_id(&self) -> std::result::Result<u64, WalletError> {
        self.record("chain_id");
        Ok(*self.chain.lock().unwrap())
    }

    async fn switch_chain(&self, chain_id: u64) -> std::result::Result<(), WalletError> {
        self.record(format!("switch_chain:{}", chain_id));
        if let Some(err) = self.switch_error.lock().unwrap().take() {
            return Err(err);
        }
        if *self.switch_applies.lock().unwrap() {
            *self.chain.lock().unwrap() = chain_id;
        }
        Ok(())
    }

    async fn add_chain(&self, chain: &ChainDescriptor) -> std::result::Result<(), WalletError> {
        self.record(format!("add_chain:{}", chain.id));
        Ok(())
    }

    async fn get_addresses(&self) -> std::result::Result<Vec<Address>, WalletError> {
        self.record("get_addresses");
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn request_addresses(&self) -> std::result::Result<Vec<Address>, WalletError> {
        self.record("request_addresses");
        Ok(self.requested_accounts.lock().unwrap().clone())
    }

    async fn write_contract(&self, call: &ContractCall) -> std::result::Result<H256, WalletError> {
        self.record(format!("write_contract:{}", call.function_name));
        if let Some(err) = self.write_error.lock().unwrap().take() {
            return Err(err);
        }
        self.writes.lock().unwrap().push(call.clone());
        Ok(H256::from(TEST_TX_HASH))
    }
}

type ReadHandler = Box<dyn Fn(&str, &[Token]) -> Result<Vec<Token>> + Send + Sync>;

pub struct MockReadClient {
    handler: ReadHandler,
    pub reads: Mutex<Vec<String>>,
    pub receipt_requests: Mutex<Vec<H256>>,
}

impl MockReadClient {
    pub fn new(
        handler: impl Fn(&str, &[Token]) -> Result<Vec<Token>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            reads: Mutex::new(Vec::new()),
            receipt_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self::new(|function, _| Err(AppError::BlockchainRPC(format!("{} not mocked", function))))
    }

    pub fn read_count(&self, function: &str) -> usize {
        self.reads
            .lock()
            .unwrap()
            .iter()
            .filter(|name| name.as_str() == function)
            .count()
    }
}

#[async_trait]
impl ReadClient for MockReadClient {
    async fn read_contract(
        &self,
        _address: Address,
        abi: &Abi,
        function_name: &str,
        args: Vec<Token>,
    ) -> Result<Vec<Token>> {
        abi.function(function_name)
            .map_err(|e| AppError::Abi(e.to_string()))?;
        self.reads.lock().unwrap().push(function_name.to_string());
        (self.handler)(function_name, &args)
    }

    async fn wait_for_transaction_receipt(&self, hash: H256) -> Result<TransactionReceipt> {
        self.receipt_requests.lock().unwrap().push(hash);
        Ok(TransactionReceipt {
            transaction_hash: hash,
            status: Some(U64::one()),
            ..Default::default()
        })
    }
}

#[derive(Clone)]
pub struct MockFactory {
    pub wallet: Option<Arc<MockWallet>>,
    pub reader: Arc<MockReadClient>,
    pub wallet_creations: Arc<AtomicUsize>,
}

impl MockFactory {
    pub fn wallet_creations(&self) -> usize {
        self.wallet_creations.load(Ordering::SeqCst)
    }
}

impl ClientFactory for MockFactory {
    fn read_client(&self, _config: &ContractConfig) -> Result<Arc<dyn ReadClient>> {
        Ok(self.reader.clone())
    }

    fn wallet_client(&self, _config: &ContractConfig) -> Option<Arc<dyn WalletClient>> {
        let wallet = self.wallet.clone()?;
        self.wallet_creations.fetch_add(1, Ordering::SeqCst);
        Some(wallet)
    }
}

/// Cache that records every invalidated key into the shared log.
pub struct RecordingCache {
    pub invalidated: Mutex<Vec<QueryKey>>,
    pub log: EventLog,
}

impl RecordingCache {
    pub fn new(log: EventLog) -> Self {
        Self {
            invalidated: Mutex::new(Vec::new()),
            log,
        }
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        self.invalidated.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryCache for RecordingCache {
    async fn get(&self, _key: &QueryKey) -> Result<Option<serde_json::Value>> {
        Ok(None)
    }

    async fn put(&self, _key: &QueryKey, _value: serde_json::Value) -> Result<()> {
        Ok(())
    }

    async fn invalidate(&self, key: &QueryKey) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("invalidate:{}", key.to_cache_string()));
        self.invalidated.lock().unwrap().push(key.clone());
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "recording"
    }
}

pub fn registry_with(factory: MockFactory) -> Arc<ClientRegistry> {
    let resolver = ContractResolver::from_config(&Config::for_tests()).unwrap();
    Arc::new(ClientRegistry::new(resolver, Box::new(factory)))
}
