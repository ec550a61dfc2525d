use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// Ledger entry. Only `status` and `updated_at` change after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub request_id: Uuid,
    pub reference: String,
    // minor units, always positive
    pub amount: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    /// Signed balance delta for an amount moving in this direction.
    pub fn signed(self, amount: i64) -> i64 {
        match self {
            TransactionType::Credit => amount,
            TransactionType::Debit => -amount,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "credit" => Some(TransactionType::Credit),
            "debit" => Some(TransactionType::Debit),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Credit => f.write_str("credit"),
            TransactionType::Debit => f.write_str("debit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => f.write_str("pending"),
            TransactionStatus::Completed => f.write_str("completed"),
            TransactionStatus::Failed => f.write_str("failed"),
        }
    }
}

/// What the engine hands to the ledger when it reserves a transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub request_id: Uuid,
    pub reference: String,
    pub amount: i64,
    pub transaction_type: TransactionType,
    // stamped by the service so entry age never depends on the database clock
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    pub fn new(
        user_id: Uuid,
        reference: impl Into<String>,
        transaction_type: TransactionType,
        amount: i64,
    ) -> Self {
        Self {
            user_id,
            request_id: Uuid::new_v4(),
            reference: reference.into(),
            amount,
            transaction_type,
            // microseconds, the precision Postgres keeps
            created_at: Utc::now().trunc_subsecs(6),
        }
    }

    /// Materialises the pending ledger row with a fresh id.
    pub fn into_pending(self) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            request_id: self.request_id,
            reference: self.reference,
            amount: self.amount,
            transaction_type: self.transaction_type,
            status: TransactionStatus::Pending,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}
