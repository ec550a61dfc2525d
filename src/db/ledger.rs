use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::store::{LedgerStore, Result};
use super::tx::{NewTransaction, Transaction};
use super::utils::map_insert_error;
use crate::error::StoreError;

const TRANSACTION_COLUMNS: &str =
    "id, user_id, request_id, reference, amount, type, status, created_at, updated_at";

// Database repository
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1");
        Ok(sqlx::query_as::<_, Transaction>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl LedgerStore for TransactionRepository {
    async fn create_transaction(&self, entry: NewTransaction) -> Result<Transaction> {
        let query = format!(
            r#"
            INSERT INTO transactions
                (user_id, request_id, reference, amount, type, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $6)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let reference = entry.reference.clone();

        sqlx::query_as::<_, Transaction>(&query)
            .bind(entry.user_id)
            .bind(entry.request_id)
            .bind(&entry.reference)
            .bind(entry.amount)
            .bind(entry.transaction_type)
            .bind(entry.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| map_insert_error(err, || StoreError::DuplicateReference(reference)))
    }

    async fn find_transaction_by_reference(&self, reference: &str) -> Result<Transaction> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE reference = $1");
        sqlx::query_as::<_, Transaction>(&query)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("transaction"))
    }

    async fn mark_transaction_failed(&self, id: Uuid) -> Result<Transaction> {
        let query = format!(
            r#"
            UPDATE transactions SET status = 'failed', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, Transaction>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(transaction) => Ok(transaction),
            // nothing pending under that id, find out why
            None => match self.find_by_id(id).await? {
                Some(existing) => Err(StoreError::AlreadyFinalized {
                    id,
                    status: existing.status,
                }),
                None => Err(StoreError::NotFound("transaction")),
            },
        }
    }
}
