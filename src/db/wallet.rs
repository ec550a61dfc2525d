use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::store::{Result, WalletStore};
use super::tx::Transaction;
use super::utils::map_insert_error;
use crate::error::StoreError;

const WALLET_COLUMNS: &str = "id, user_id, balance, transaction_id, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    // minor units, never negative
    pub balance: i64,
    // last transaction applied, for audit only
    pub transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: Uuid, balance: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// Database repository
pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_id(&self, wallet_id: Uuid) -> Result<Wallet> {
        let query = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE id = $1");
        sqlx::query_as::<_, Wallet>(&query)
            .bind(wallet_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("wallet"))
    }
}

#[async_trait]
impl WalletStore for WalletRepository {
    async fn find_wallet_by_user(&self, user_id: Uuid) -> Result<Wallet> {
        let query = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1");
        sqlx::query_as::<_, Wallet>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("wallet"))
    }

    async fn create_wallet(&self, user_id: Uuid, opening_balance: i64) -> Result<Wallet> {
        // negative opening balances are rejected by the balance CHECK constraint
        let query = format!(
            r#"
            INSERT INTO wallets (user_id, balance)
            VALUES ($1, $2)
            RETURNING {WALLET_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Wallet>(&query)
            .bind(user_id)
            .bind(opening_balance)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| map_insert_error(err, || StoreError::DuplicateWallet(user_id)))
    }

    async fn adjust_balance_atomic(
        &self,
        wallet_id: Uuid,
        transaction: &Transaction,
        signed_amount: i64,
    ) -> Result<Wallet> {
        // Dropping `tx` without commit rolls everything back.
        let mut tx = self.pool.begin().await?;

        let owner = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE transactions SET status = 'completed', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING user_id
            "#,
        )
        .bind(transaction.id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(owner) = owner else {
            let status = sqlx::query_scalar::<_, super::tx::TransactionStatus>(
                "SELECT status FROM transactions WHERE id = $1",
            )
            .bind(transaction.id)
            .fetch_optional(&mut *tx)
            .await?;

            return Err(match status {
                Some(status) => StoreError::AlreadyFinalized {
                    id: transaction.id,
                    status,
                },
                None => StoreError::NotFound("transaction"),
            });
        };

        // lock the wallet row to serialize concurrent adjustments
        let (user_id, balance) = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT user_id, balance FROM wallets WHERE id = $1 FOR UPDATE",
        )
        .bind(wallet_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound("wallet"))?;

        if user_id != owner {
            return Err(StoreError::WalletMismatch {
                wallet_id,
                transaction_id: transaction.id,
            });
        }

        let new_balance = balance
            .checked_add(signed_amount)
            .filter(|balance| *balance >= 0)
            .ok_or(StoreError::InsufficientFunds(wallet_id))?;

        sqlx::query(
            r#"
            UPDATE wallets SET balance = $1, transaction_id = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(new_balance)
        .bind(transaction.id)
        .bind(wallet_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(
            "wallet {} adjusted by {} for transaction {}",
            wallet_id,
            signed_amount,
            transaction.id
        );

        self.find_by_id(wallet_id).await
    }
}
