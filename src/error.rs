use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid numeric value: {0}")]
    InvalidNumeric(String),

    #[error("Wallet client unavailable. Connect a compatible wallet to continue.")]
    WalletUnavailable,

    #[error("Switch your wallet to the {chain_name} network to continue.")]
    ChainMismatch { chain_name: String },

    #[error("No wallet address available from the connected provider.")]
    NoAccount,

    #[error("User rejected the request: {0}")]
    UserRejected(String),

    #[error("Wallet provider error: {message}")]
    Provider { code: Option<i64>, message: String },

    #[error("Transaction receipt not available: {0}")]
    ReceiptTimeout(String),

    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("Blockchain RPC error: {0}")]
    BlockchainRPC(String),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Cache error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("External API error: {0}")]
    ExternalAPI(String),
}

/// Structured classification of an [`AppError`]. Callers branch on this
/// instead of matching message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    WalletUnavailable,
    ChainMismatch,
    NoAccount,
    UserRejected,
    Provider,
    ReceiptTimeout,
    Reverted,
    Rpc,
    Cache,
    NotFound,
    Internal,
}

impl ErrorKind {
    /// True when re-running the mutation after a forced chain switch can succeed.
    pub fn needs_chain_switch(self) -> bool {
        matches!(self, ErrorKind::ChainMismatch)
    }

    /// Environment failures detected before anything was submitted.
    pub fn is_pre_submission(self) -> bool {
        matches!(
            self,
            ErrorKind::Validation
                | ErrorKind::WalletUnavailable
                | ErrorKind::ChainMismatch
                | ErrorKind::NoAccount
        )
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidAddress(_) | AppError::InvalidNumeric(_) | AppError::BadRequest(_) => {
                ErrorKind::Validation
            }
            AppError::WalletUnavailable => ErrorKind::WalletUnavailable,
            AppError::ChainMismatch { .. } => ErrorKind::ChainMismatch,
            AppError::NoAccount => ErrorKind::NoAccount,
            AppError::UserRejected(_) => ErrorKind::UserRejected,
            AppError::Provider { .. } => ErrorKind::Provider,
            AppError::ReceiptTimeout(_) => ErrorKind::ReceiptTimeout,
            AppError::TransactionReverted(_) => ErrorKind::Reverted,
            AppError::BlockchainRPC(_) | AppError::ExternalAPI(_) => ErrorKind::Rpc,
            AppError::Redis(_) => ErrorKind::Cache,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Abi(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, code) = match self {
            AppError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, "INVALID_ADDRESS"),
            AppError::InvalidNumeric(_) => (StatusCode::BAD_REQUEST, "INVALID_NUMERIC"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::WalletUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "WALLET_UNAVAILABLE"),
            AppError::ChainMismatch { .. } => (StatusCode::CONFLICT, "CHAIN_MISMATCH"),
            AppError::NoAccount => (StatusCode::CONFLICT, "NO_ACCOUNT"),
            AppError::UserRejected(_) => (StatusCode::BAD_REQUEST, "USER_REJECTED"),
            AppError::Provider { .. } => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
            AppError::ReceiptTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "RECEIPT_TIMEOUT"),
            AppError::TransactionReverted(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "TRANSACTION_REVERTED")
            }
            AppError::BlockchainRPC(_) => (StatusCode::BAD_GATEWAY, "BLOCKCHAIN_RPC_ERROR"),
            AppError::ExternalAPI(_) => (StatusCode::BAD_GATEWAY, "EXTERNAL_API_ERROR"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Redis(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CACHE_ERROR"),
            AppError::Abi(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
