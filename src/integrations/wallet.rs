use async_trait::async_trait;
use ethers::abi::{Abi, Token};
use ethers::types::{Address, Bytes, H256, U256};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    constants::{EIP1193_UNRECOGNIZED_CHAIN, EIP1193_USER_REJECTED},
    error::AppError,
    services::contract_config::ChainDescriptor,
    services::normalizer::{checksum, normalize_optional_address},
};

/// Structured EIP-1193 failure, classified from the provider error code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    #[error("Unrecognized chain: {0}")]
    UnrecognizedChain(String),

    #[error("User rejected the request: {0}")]
    UserRejected(String),

    #[error("Provider error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Wallet transport error: {0}")]
    Transport(String),
}

impl WalletError {
    pub fn from_code(code: i64, message: String) -> Self {
        match code {
            EIP1193_UNRECOGNIZED_CHAIN => WalletError::UnrecognizedChain(message),
            EIP1193_USER_REJECTED => WalletError::UserRejected(message),
            _ => WalletError::Rpc { code, message },
        }
    }
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::UserRejected(message) => AppError::UserRejected(message),
            WalletError::UnrecognizedChain(message) => AppError::Provider {
                code: Some(EIP1193_UNRECOGNIZED_CHAIN),
                message,
            },
            WalletError::Rpc { code, message } => AppError::Provider {
                code: Some(code),
                message,
            },
            WalletError::Transport(message) => AppError::Provider {
                code: None,
                message,
            },
        }
    }
}

pub type WalletResult<T> = std::result::Result<T, WalletError>;

/// A contract write as handed to the wallet for signing.
#[derive(Debug, Clone)]
pub struct ContractCall {
    pub address: Address,
    pub abi: Arc<Abi>,
    pub function_name: String,
    pub args: Vec<Token>,
    pub account: Address,
    pub chain_id: u64,
    pub value: Option<U256>,
}

impl ContractCall {
    pub fn calldata(&self) -> crate::error::Result<Bytes> {
        let function = self
            .abi
            .function(&self.function_name)
            .map_err(|e| AppError::Abi(format!("{}: {}", self.function_name, e)))?;
        let encoded = function
            .encode_input(&self.args)
            .map_err(|e| AppError::Abi(format!("{}: {}", self.function_name, e)))?;
        Ok(Bytes::from(encoded))
    }
}

/// EIP-1193 wallet capability consumed by the write pipeline.
#[async_trait]
pub trait WalletClient: Send + Sync {
    async fn chain_id(&self) -> WalletResult<u64>;
    async fn switch_chain(&self, chain_id: u64) -> WalletResult<()>;
    async fn add_chain(&self, chain: &ChainDescriptor) -> WalletResult<()>;
    async fn get_addresses(&self) -> WalletResult<Vec<Address>>;
    async fn request_addresses(&self) -> WalletResult<Vec<Address>>;
    async fn write_contract(&self, call: &ContractCall) -> WalletResult<H256>;
}

fn rpc_request(id: u64, method: &str, params: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": id
    })
}

fn add_chain_params(chain: &ChainDescriptor) -> serde_json::Value {
    let mut params = serde_json::json!({
        "chainId": chain.id_hex(),
        "chainName": chain.name,
        "rpcUrls": [chain.rpc_url],
        "nativeCurrency": {
            "name": chain.native_currency.name,
            "symbol": chain.native_currency.symbol,
            "decimals": chain.native_currency.decimals
        }
    });
    if let Some(explorer) = &chain.block_explorer_url {
        params["blockExplorerUrls"] = serde_json::json!([explorer]);
    }
    params
}

fn send_transaction_params(call: &ContractCall, data: &Bytes) -> serde_json::Value {
    let mut tx = serde_json::json!({
        "from": checksum(&call.account),
        "to": checksum(&call.address),
        "data": format!("0x{}", hex::encode(data.as_ref())),
        "chainId": format!("0x{:x}", call.chain_id),
    });
    if let Some(value) = call.value {
        tx["value"] = serde_json::json!(format!("0x{:x}", value));
    }
    tx
}

fn parse_chain_id(value: &serde_json::Value) -> WalletResult<u64> {
    match value {
        serde_json::Value::String(text) => {
            let parsed = match text.strip_prefix("0x") {
                Some(hex_digits) => u64::from_str_radix(hex_digits, 16),
                None => text.parse::<u64>(),
            };
            parsed.map_err(|e| WalletError::Transport(format!("Invalid chain id {}: {}", text, e)))
        }
        serde_json::Value::Number(number) => number
            .as_u64()
            .ok_or_else(|| WalletError::Transport(format!("Invalid chain id {}", number))),
        other => Err(WalletError::Transport(format!("Invalid chain id {}", other))),
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<serde_json::Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    data: Option<serde_json::Value>,
}

impl RpcErrorObject {
    /// Some wallets wrap 4902 inside an internal error's `originalError`.
    fn effective_code(&self) -> i64 {
        self.data
            .as_ref()
            .and_then(|data| data.get("originalError"))
            .and_then(|original| original.get("code"))
            .and_then(|code| code.as_i64())
            .unwrap_or(self.code)
    }
}

/// Wallet endpoint speaking EIP-1193 methods over JSON-RPC/HTTP.
pub struct JsonRpcWallet {
    endpoint: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcWallet {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn request(&self, method: &str, params: serde_json::Value) -> WalletResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&rpc_request(id, method, params))
            .send()
            .await
            .map_err(|e| WalletError::Transport(e.to_string()))?;

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| WalletError::Transport(e.to_string()))?;

        if let Some(error) = envelope.error {
            tracing::debug!("wallet {} failed: code={} {}", method, error.code, error.message);
            return Err(WalletError::from_code(error.effective_code(), error.message));
        }
        Ok(envelope.result.unwrap_or(serde_json::Value::Null))
    }

    async fn addresses(&self, method: &str) -> WalletResult<Vec<Address>> {
        let result = self.request(method, serde_json::json!([])).await?;
        let raw: Vec<String> = serde_json::from_value(result)
            .map_err(|e| WalletError::Transport(format!("Invalid {} result: {}", method, e)))?;
        Ok(raw
            .iter()
            .filter_map(|value| normalize_optional_address(Some(value)))
            .collect())
    }
}

#[async_trait]
impl WalletClient for JsonRpcWallet {
    async fn chain_id(&self) -> WalletResult<u64> {
        let result = self.request("eth_chainId", serde_json::json!([])).await?;
        parse_chain_id(&result)
    }

    async fn switch_chain(&self, chain_id: u64) -> WalletResult<()> {
        self.request(
            "wallet_switchEthereumChain",
            serde_json::json!([{ "chainId": format!("0x{:x}", chain_id) }]),
        )
        .await?;
        Ok(())
    }

    async fn add_chain(&self, chain: &ChainDescriptor) -> WalletResult<()> {
        self.request(
            "wallet_addEthereumChain",
            serde_json::json!([add_chain_params(chain)]),
        )
        .await?;
        Ok(())
    }

    async fn get_addresses(&self) -> WalletResult<Vec<Address>> {
        self.addresses("eth_accounts").await
    }

    async fn request_addresses(&self) -> WalletResult<Vec<Address>> {
        self.addresses("eth_requestAccounts").await
    }

    async fn write_contract(&self, call: &ContractCall) -> WalletResult<H256> {
        let data = call
            .calldata()
            .map_err(|e| WalletError::Transport(e.to_string()))?;
        let result = self
            .request(
                "eth_sendTransaction",
                serde_json::json!([send_transaction_params(call, &data)]),
            )
            .await?;
        let hash = result
            .as_str()
            .ok_or_else(|| WalletError::Transport(format!("Invalid transaction hash {}", result)))?;
        H256::from_str(hash).map_err(|e| WalletError::Transport(format!("Invalid transaction hash {}: {}", hash, e)))
    }
}
