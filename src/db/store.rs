use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::tx::{NewTransaction, Transaction};
use super::user::User;
use super::wallet::Wallet;
use crate::error::StoreError;

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<User>;
}

/// Append-mostly ledger of transfer attempts, unique by `reference`.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a `pending` entry. A reused reference yields
    /// [`StoreError::DuplicateReference`] and leaves the ledger untouched.
    async fn create_transaction(&self, entry: NewTransaction) -> Result<Transaction>;

    async fn find_transaction_by_reference(&self, reference: &str) -> Result<Transaction>;

    /// Moves a `pending` entry to `failed`. Terminal entries are left as they
    /// are and reported as [`StoreError::AlreadyFinalized`].
    async fn mark_transaction_failed(&self, id: Uuid) -> Result<Transaction>;
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn find_wallet_by_user(&self, user_id: Uuid) -> Result<Wallet>;

    async fn create_wallet(&self, user_id: Uuid, opening_balance: i64) -> Result<Wallet>;

    /// Completes `transaction` and applies `signed_amount` to the wallet as one
    /// unit, holding an exclusive lock on the wallet for the duration.
    ///
    /// Either both the status change and the balance change become durable or
    /// neither does. Fails with [`StoreError::AlreadyFinalized`] when the
    /// transaction is no longer `pending` and with
    /// [`StoreError::InsufficientFunds`] when the balance would go negative.
    /// Returns the wallet as re-read after commit.
    async fn adjust_balance_atomic(
        &self,
        wallet_id: Uuid,
        transaction: &Transaction,
        signed_amount: i64,
    ) -> Result<Wallet>;
}

pub type UserStoreRef = Arc<dyn UserStore>;
pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type WalletStoreRef = Arc<dyn WalletStore>;
