use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::db::tx::TransactionStatus;

/// Failures raised by the ledger, wallet and user stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("transaction already exists for reference {0}")]
    DuplicateReference(String),

    #[error("wallet already exists for user {0}")]
    DuplicateWallet(Uuid),

    #[error("transaction {id} is already {status}")]
    AlreadyFinalized { id: Uuid, status: TransactionStatus },

    #[error("wallet {wallet_id} does not belong to the owner of transaction {transaction_id}")]
    WalletMismatch { wallet_id: Uuid, transaction_id: Uuid },

    #[error("wallet {0} cannot cover the adjustment")]
    InsufficientFunds(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("payment gateway did not answer within {0:?}")]
    Timeout(Duration),

    #[error("payment gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid payment gateway url: {0}")]
    InvalidUrl(String),
}

/// Every way a transfer or a reconciliation can end without completing.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("amount cannot be represented in minor units")]
    InvalidAmount,

    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error("wallet not found for user {0}")]
    WalletNotFound(Uuid),

    #[error("failed to look up {what}: {source}")]
    Lookup {
        what: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("failed to create transaction: {0}")]
    TransactionCreateFailed(#[source] StoreError),

    #[error("payment failed: {0}")]
    PaymentFailed(#[source] GatewayError),

    #[error("payment failed ({payment}) and transaction {id} could not be marked failed: {source}")]
    TransactionUpdateFailed {
        id: Uuid,
        payment: GatewayError,
        #[source]
        source: StoreError,
    },

    #[error("transaction {id} could not be marked failed during reconciliation: {source}")]
    ReconcileUpdateFailed {
        id: Uuid,
        #[source]
        source: StoreError,
    },

    #[error("payment went through but wallet update failed: {0}")]
    WalletUpdateFailed(#[source] StoreError),

    #[error("transaction not found for reference {0}")]
    TransactionNotFound(String),

    #[error("transaction {0} may still have a payment in flight")]
    StillInFlight(String),

    #[error("failed to look up payment with the gateway: {0}")]
    PaymentLookupFailed(#[source] GatewayError),
}

impl TransferError {
    /// Message safe to hand back to the caller.
    pub fn message(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "Invalid amount",
            TransferError::UserNotFound(_) => "User not found",
            TransferError::WalletNotFound(_) => "Wallet not found",
            TransferError::Lookup { .. } => "Failed to process transaction",
            TransferError::TransactionCreateFailed(StoreError::DuplicateReference(_)) => {
                "Transaction already exists"
            }
            TransferError::TransactionCreateFailed(_) => "Failed to create transaction",
            TransferError::PaymentFailed(_) => "Failed to make payment",
            TransferError::TransactionUpdateFailed { .. }
            | TransferError::ReconcileUpdateFailed { .. } => "Failed to update transaction",
            TransferError::WalletUpdateFailed(_) => "Failed to update wallet",
            TransferError::TransactionNotFound(_) => "Transaction not found",
            TransferError::StillInFlight(_) => "Transaction is still being processed",
            TransferError::PaymentLookupFailed(_) => "Failed to confirm payment",
        }
    }

    /// True when the caller submitted a reference that was already used.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            TransferError::TransactionCreateFailed(StoreError::DuplicateReference(_))
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
