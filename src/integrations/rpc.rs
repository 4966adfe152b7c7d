use async_trait::async_trait;
use ethers::abi::{Abi, Token};
use ethers::providers::{Http, Middleware, Provider, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionReceipt, TransactionRequest, H256, U64};
use std::time::Duration;
use tokio::time::sleep;

use crate::{
    config::Config,
    error::{AppError, Result},
};

/// Read capability for one chain endpoint.
#[async_trait]
pub trait ReadClient: Send + Sync {
    async fn read_contract(
        &self,
        address: Address,
        abi: &Abi,
        function_name: &str,
        args: Vec<Token>,
    ) -> Result<Vec<Token>>;

    async fn wait_for_transaction_receipt(&self, hash: H256) -> Result<TransactionReceipt>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptPolicy {
    pub attempts: usize,
    pub interval: Duration,
}

impl ReceiptPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.receipt_poll_attempts.max(1),
            interval: Duration::from_millis(config.receipt_poll_interval_ms),
        }
    }
}

pub struct EthersReadClient {
    provider: Provider<Http>,
    policy: ReceiptPolicy,
}

impl EthersReadClient {
    pub fn new(rpc_url: &str, policy: ReceiptPolicy) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| AppError::BlockchainRPC(format!("Invalid RPC url {}: {}", rpc_url, e)))?;
        Ok(Self { provider, policy })
    }
}

/// Classifies a failed receipt as reverted when the node reports status 0.
pub fn ensure_succeeded(receipt: TransactionReceipt) -> Result<TransactionReceipt> {
    if receipt.status == Some(U64::zero()) {
        return Err(AppError::TransactionReverted(format!(
            "{:#x}",
            receipt.transaction_hash
        )));
    }
    Ok(receipt)
}

#[async_trait]
impl ReadClient for EthersReadClient {
    async fn read_contract(
        &self,
        address: Address,
        abi: &Abi,
        function_name: &str,
        args: Vec<Token>,
    ) -> Result<Vec<Token>> {
        let function = abi
            .function(function_name)
            .map_err(|e| AppError::Abi(format!("{}: {}", function_name, e)))?;
        let data = function
            .encode_input(&args)
            .map_err(|e| AppError::Abi(format!("{}: {}", function_name, e)))?;

        let tx: TypedTransaction = TransactionRequest::new().to(address).data(data).into();
        let output = self.provider.call(&tx, None).await.map_err(|e| {
            let reverted = e
                .as_error_response()
                .map(|response| response.is_revert())
                .unwrap_or(false);
            if reverted {
                AppError::TransactionReverted(format!("{} reverted: {}", function_name, e))
            } else {
                AppError::BlockchainRPC(format!("{} failed: {}", function_name, e))
            }
        })?;

        function
            .decode_output(output.as_ref())
            .map_err(|e| AppError::Abi(format!("{} output: {}", function_name, e)))
    }

    async fn wait_for_transaction_receipt(&self, hash: H256) -> Result<TransactionReceipt> {
        let mut last_error = "receipt not yet available".to_string();

        for attempt in 0..self.policy.attempts {
            match self.provider.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => return ensure_succeeded(receipt),
                Ok(None) => {}
                Err(err) => last_error = err.to_string(),
            }
            if attempt + 1 < self.policy.attempts {
                sleep(self.policy.interval).await;
            }
        }

        tracing::warn!("Receipt for {:#x} not available: {}", hash, last_error);
        Err(AppError::ReceiptTimeout(format!("{:#x}: {}", hash, last_error)))
    }
}
