use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use ethers::providers::ProviderError;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::api_response::ApiResponse;

/// EIP-1193 code returned by wallets when the user rejects a request.
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-1193 code returned when the requested chain is not known to the wallet.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

#[derive(Error, Debug)]
pub enum CustomError {
    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),

    #[error("Invalid address: {0}")]
    InvalidAddressError(String),

    #[error("Invalid amount: {0}")]
    InvalidAmountError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unsupported chain: {0}")]
    UnsupportedChainError(u64),

    #[error("Provider error: {0}")]
    StringifiedProviderError(String),

    #[error("Contract error: {0}")]
    ContractError(String),

    #[error("Token not found: {0}")]
    TokenNotFoundError(String),

    #[error("Resource not found")]
    NotFoundError,

    #[error("Swap session not found: {0}")]
    SessionNotFoundError(Uuid),

    #[error("Transaction failed")]
    TransactionFailedError,

    #[error("Failed to get transaction receipt")]
    TransactionReceiptFailedError,

    #[error("A transaction is already pending")]
    TransactionPendingError,

    #[error("Transaction rejected by user")]
    UserRejectedError,

    #[error("Wallet is not installed")]
    WalletNotInstalledError,

    #[error("Wallet is not connected")]
    WalletNotConnectedError,

    #[error("Wallet error {code}: {message}")]
    WalletRpcError { code: i64, message: String },

    #[error("Invalid input: {0}")]
    ValidationError(String),
}

/// The three failure classes surfaced to the user, plus input validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UserRejected,
    WalletNotInstalled,
    RpcFailure,
    Validation,
}

impl CustomError {
    /// Builds an error from a contract/RPC failure message, recognising
    /// user rejections that wallets only report as text.
    pub fn from_rpc_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_user_rejection(&message) {
            CustomError::UserRejectedError
        } else {
            CustomError::ContractError(message)
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CustomError::UserRejectedError => ErrorKind::UserRejected,
            CustomError::WalletRpcError { code, .. } if *code == USER_REJECTED_CODE => {
                ErrorKind::UserRejected
            }
            CustomError::WalletNotInstalledError => ErrorKind::WalletNotInstalled,
            CustomError::ValidationError(_)
            | CustomError::InvalidAddressError(_)
            | CustomError::InvalidAmountError(_)
            | CustomError::TokenNotFoundError(_)
            | CustomError::UnsupportedChainError(_)
            | CustomError::SessionNotFoundError(_)
            | CustomError::NotFoundError
            | CustomError::TransactionPendingError
            | CustomError::WalletNotConnectedError => ErrorKind::Validation,
            CustomError::ProviderError(e) if is_user_rejection(&e.to_string()) => {
                ErrorKind::UserRejected
            }
            _ => ErrorKind::RpcFailure,
        }
    }

    /// Message shown in the transient error notification.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::UserRejected => "Transaction rejected by user".to_string(),
            ErrorKind::WalletNotInstalled => "Wallet is not installed".to_string(),
            _ => self.to_string(),
        }
    }
}

fn is_user_rejection(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("user rejected")
        || lower.contains("user denied")
        || lower.contains(&format!("code: {}", USER_REJECTED_CODE))
        || lower.contains(&format!("\"code\":{}", USER_REJECTED_CODE))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    code: u16,
    kind: ErrorKind,
    message: String,
}

impl ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        match self {
            CustomError::NotFoundError
            | CustomError::TokenNotFoundError(_)
            | CustomError::SessionNotFoundError(_) => StatusCode::NOT_FOUND,
            CustomError::TransactionPendingError => StatusCode::CONFLICT,
            CustomError::WalletNotInstalledError => StatusCode::SERVICE_UNAVAILABLE,
            CustomError::WalletNotConnectedError => StatusCode::UNAUTHORIZED,
            CustomError::ProviderError(_)
            | CustomError::NetworkError(_)
            | CustomError::StringifiedProviderError(_)
            | CustomError::ContractError(_)
            | CustomError::TransactionFailedError
            | CustomError::TransactionReceiptFailedError => StatusCode::INTERNAL_SERVER_ERROR,
            CustomError::UserRejectedError
            | CustomError::WalletRpcError { .. }
            | CustomError::InvalidAddressError(_)
            | CustomError::InvalidAmountError(_)
            | CustomError::UnsupportedChainError(_)
            | CustomError::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let api_error = ApiError {
            code: status.as_u16(),
            kind: self.kind(),
            message: self.user_message(),
        };

        HttpResponse::build(status).json(ApiResponse {
            status: "FAILURE".to_string(),
            code: api_error.code,
            result: None::<()>,
            error: Some(api_error),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_user_rejection_from_text() {
        let err = CustomError::from_rpc_message("MetaMask Tx Signature: User denied transaction signature.");
        assert_eq!(err.kind(), ErrorKind::UserRejected);
        assert_eq!(err.user_message(), "Transaction rejected by user");
    }

    #[test]
    fn classifies_wallet_rpc_codes() {
        let rejected = CustomError::WalletRpcError {
            code: USER_REJECTED_CODE,
            message: "rejected".into(),
        };
        assert_eq!(rejected.kind(), ErrorKind::UserRejected);

        let unknown_chain = CustomError::WalletRpcError {
            code: UNRECOGNIZED_CHAIN_CODE,
            message: "Unrecognized chain ID".into(),
        };
        assert_eq!(unknown_chain.kind(), ErrorKind::RpcFailure);
    }

    #[test]
    fn other_rpc_failures_keep_their_message() {
        let err = CustomError::from_rpc_message("execution reverted: Insufficient liquidity");
        assert_eq!(err.kind(), ErrorKind::RpcFailure);
        assert_eq!(
            err.user_message(),
            "Contract error: execution reverted: Insufficient liquidity"
        );
    }

    #[test]
    fn wallet_not_installed_maps_to_503() {
        let err = CustomError::WalletNotInstalledError;
        assert_eq!(err.kind(), ErrorKind::WalletNotInstalled);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.user_message(), "Wallet is not installed");
    }
}
