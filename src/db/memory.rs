use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::store::{LedgerStore, Result, UserStore, WalletStore};
use super::tx::{NewTransaction, Transaction, TransactionStatus};
use super::user::User;
use super::wallet::Wallet;
use crate::error::StoreError;

/// A thread-safe in-memory implementation of every store contract.
///
/// Each wallet sits behind its own `Mutex`, so adjustments to one wallet are
/// serialized while other wallets proceed independently. Cloning shares the
/// underlying state, which lets one instance back all three store traits.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    users: RwLock<HashMap<Uuid, User>>,
    wallets: RwLock<HashMap<Uuid, Arc<Mutex<Wallet>>>>,
    wallet_by_user: RwLock<HashMap<Uuid, Uuid>>,
    ledger: RwLock<Ledger>,
}

#[derive(Default)]
struct Ledger {
    entries: HashMap<Uuid, Transaction>,
    by_reference: HashMap<String, Uuid>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, email: &str, full_name: Option<&str>) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: full_name.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        self.inner.users.write().await.insert(user.id, user.clone());
        user
    }

    /// Every ledger entry belonging to `user_id`, oldest first.
    pub async fn transactions_for_user(&self, user_id: Uuid) -> Vec<Transaction> {
        let ledger = self.inner.ledger.read().await;
        let mut entries: Vec<Transaction> = ledger
            .entries
            .values()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.created_at);
        entries
    }

    async fn wallet_slot(&self, wallet_id: Uuid) -> Result<Arc<Mutex<Wallet>>> {
        self.inner
            .wallets
            .read()
            .await
            .get(&wallet_id)
            .cloned()
            .ok_or(StoreError::NotFound("wallet"))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, user_id: Uuid) -> Result<User> {
        self.inner
            .users
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or(StoreError::NotFound("user"))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn create_transaction(&self, entry: NewTransaction) -> Result<Transaction> {
        let mut ledger = self.inner.ledger.write().await;
        if ledger.by_reference.contains_key(&entry.reference) {
            return Err(StoreError::DuplicateReference(entry.reference));
        }

        let transaction = entry.into_pending();
        ledger
            .by_reference
            .insert(transaction.reference.clone(), transaction.id);
        ledger.entries.insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn find_transaction_by_reference(&self, reference: &str) -> Result<Transaction> {
        let ledger = self.inner.ledger.read().await;
        ledger
            .by_reference
            .get(reference)
            .and_then(|id| ledger.entries.get(id))
            .cloned()
            .ok_or(StoreError::NotFound("transaction"))
    }

    async fn mark_transaction_failed(&self, id: Uuid) -> Result<Transaction> {
        let mut ledger = self.inner.ledger.write().await;
        let entry = ledger
            .entries
            .get_mut(&id)
            .ok_or(StoreError::NotFound("transaction"))?;

        if entry.status.is_terminal() {
            return Err(StoreError::AlreadyFinalized {
                id,
                status: entry.status,
            });
        }
        entry.status = TransactionStatus::Failed;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn find_wallet_by_user(&self, user_id: Uuid) -> Result<Wallet> {
        let wallet_id = self
            .inner
            .wallet_by_user
            .read()
            .await
            .get(&user_id)
            .copied()
            .ok_or(StoreError::NotFound("wallet"))?;

        let slot = self.wallet_slot(wallet_id).await?;
        let wallet = slot.lock().await.clone();
        Ok(wallet)
    }

    async fn create_wallet(&self, user_id: Uuid, opening_balance: i64) -> Result<Wallet> {
        let wallet = Wallet::new(user_id, opening_balance);
        if opening_balance < 0 {
            return Err(StoreError::InsufficientFunds(wallet.id));
        }

        let mut by_user = self.inner.wallet_by_user.write().await;
        if by_user.contains_key(&user_id) {
            return Err(StoreError::DuplicateWallet(user_id));
        }
        by_user.insert(user_id, wallet.id);
        self.inner
            .wallets
            .write()
            .await
            .insert(wallet.id, Arc::new(Mutex::new(wallet.clone())));
        Ok(wallet)
    }

    async fn adjust_balance_atomic(
        &self,
        wallet_id: Uuid,
        transaction: &Transaction,
        signed_amount: i64,
    ) -> Result<Wallet> {
        let slot = self.wallet_slot(wallet_id).await?;
        // exclusive for the whole adjustment; lock order is wallet then ledger
        let mut wallet = slot.lock().await;
        let mut ledger = self.inner.ledger.write().await;

        let entry = ledger
            .entries
            .get_mut(&transaction.id)
            .ok_or(StoreError::NotFound("transaction"))?;
        if entry.status.is_terminal() {
            return Err(StoreError::AlreadyFinalized {
                id: transaction.id,
                status: entry.status,
            });
        }
        if entry.user_id != wallet.user_id {
            return Err(StoreError::WalletMismatch {
                wallet_id,
                transaction_id: transaction.id,
            });
        }

        let new_balance = wallet
            .balance
            .checked_add(signed_amount)
            .filter(|balance| *balance >= 0)
            .ok_or(StoreError::InsufficientFunds(wallet_id))?;

        // nothing has been written yet, apply both halves together
        let now = Utc::now();
        entry.status = TransactionStatus::Completed;
        entry.updated_at = now;
        wallet.balance = new_balance;
        wallet.transaction_id = Some(transaction.id);
        wallet.updated_at = now;

        Ok(wallet.clone())
    }
}
