use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::RequestRules;
use crate::db::tx::TransactionType;
use crate::db::utils::to_minor_units;
use crate::engine::TransferRequest;
use crate::error::TransferError;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TransactionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub message: String,
}

impl TransactionResponse {
    pub fn new(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
        }
    }
}

// Fields are optional so that a missing one is reported by name instead of
// as a generic decode failure.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferPayload {
    pub amount: Option<Decimal>,
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl ValidationError {
    fn new(field: &'static str, reason: &'static str) -> Self {
        Self { field, reason }
    }
}

impl TransferPayload {
    pub fn validate(self, rules: &RequestRules) -> Result<TransferRequest, ValidationError> {
        let amount = self
            .amount
            .ok_or(ValidationError::new("amount", "is required"))?;
        check_amount(amount, rules)?;

        let user_id = self
            .user_id
            .ok_or(ValidationError::new("user_id", "is required"))?;
        let user_id = Uuid::parse_str(user_id.trim())
            .map_err(|_| ValidationError::new("user_id", "must be a valid uuid"))?;

        let transaction_type = self
            .transaction_type
            .ok_or(ValidationError::new("type", "is required"))?;
        let transaction_type = TransactionType::parse(&transaction_type)
            .ok_or(ValidationError::new("type", "must be one of credit debit"))?;

        let reference = self
            .reference
            .ok_or(ValidationError::new("reference", "is required"))?;
        check_reference(&reference, rules)?;

        Ok(TransferRequest {
            user_id,
            amount,
            transaction_type,
            reference,
        })
    }
}

#[inline]
pub fn check_amount(amount: Decimal, rules: &RequestRules) -> Result<(), ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::new("amount", "must be positive"));
    }
    if amount > rules.max_amount {
        return Err(ValidationError::new("amount", "exceeds the transfer limit"));
    }
    if to_minor_units(amount).is_none() {
        return Err(ValidationError::new("amount", "must have at most two decimal places"));
    }
    Ok(())
}

#[inline]
pub fn check_reference(reference: &str, rules: &RequestRules) -> Result<(), ValidationError> {
    if reference.trim().is_empty() {
        return Err(ValidationError::new("reference", "must not be empty"));
    }
    if reference.len() > rules.max_reference_length {
        return Err(ValidationError::new("reference", "is too long"));
    }
    if reference.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::new("reference", "must not contain whitespace"));
    }
    Ok(())
}

/// HTTP status for an engine failure: caller mistakes are 4xx, faults 5xx.
pub fn status_for(err: &TransferError) -> StatusCode {
    match err {
        TransferError::InvalidAmount => StatusCode::BAD_REQUEST,
        TransferError::UserNotFound(_)
        | TransferError::WalletNotFound(_)
        | TransferError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
        TransferError::TransactionCreateFailed(_) if err.is_duplicate() => StatusCode::CONFLICT,
        TransferError::StillInFlight(_) => StatusCode::CONFLICT,
        TransferError::PaymentFailed(_) | TransferError::PaymentLookupFailed(_) => {
            StatusCode::BAD_GATEWAY
        }
        TransferError::Lookup { .. }
        | TransferError::TransactionCreateFailed(_)
        | TransferError::TransactionUpdateFailed { .. }
        | TransferError::ReconcileUpdateFailed { .. }
        | TransferError::WalletUpdateFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
