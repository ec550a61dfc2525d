#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backend_wallet_ledger::db::memory::MemoryStore;
use backend_wallet_ledger::db::store::{LedgerStore, WalletStore};
use backend_wallet_ledger::db::tx::{NewTransaction, Transaction, TransactionType};
use backend_wallet_ledger::db::user::User;
use backend_wallet_ledger::db::wallet::Wallet;
use backend_wallet_ledger::engine::{TransferRequest, WalletLedgerEngine};
use backend_wallet_ledger::error::{GatewayError, StoreError};
use backend_wallet_ledger::gateway::{PaymentGateway, PaymentInstruction, PaymentReceipt};
use rust_decimal::Decimal;
use uuid::Uuid;

pub async fn seeded(balance: i64) -> (MemoryStore, User, Wallet) {
    let store = MemoryStore::new();
    let user = store.insert_user("john@example.com", Some("John Doe")).await;
    let wallet = store.create_wallet(user.id, balance).await.unwrap();
    (store, user, wallet)
}

pub fn engine(store: &MemoryStore, gateway: Arc<dyn PaymentGateway>) -> WalletLedgerEngine {
    WalletLedgerEngine::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        gateway,
    )
}

pub fn faulty_engine(
    store: &MemoryStore,
    faulty: &FaultyStore,
    gateway: Arc<dyn PaymentGateway>,
) -> WalletLedgerEngine {
    WalletLedgerEngine::new(
        Arc::new(store.clone()),
        Arc::new(faulty.clone()),
        Arc::new(faulty.clone()),
        gateway,
    )
}

pub fn request(user_id: Uuid, kind: TransactionType, amount: Decimal, reference: &str) -> TransferRequest {
    TransferRequest {
        user_id,
        amount,
        transaction_type: kind,
        reference: reference.to_string(),
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Behaviour {
    Approve,
    Decline,
    Hang,
    Delay(Duration),
}

/// Gateway double that answers the way it is told and counts calls.
pub struct ScriptedGateway {
    behaviour: Behaviour,
    known: Option<bool>,
    pub calls: AtomicUsize,
    pub completed: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            known: None,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        })
    }

    /// Fixes what `lookup` reports regardless of what `pay` saw.
    pub fn with_lookup(behaviour: Behaviour, known: bool) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            known: Some(known),
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn pay(
        &self,
        instruction: &PaymentInstruction,
        _deadline: Duration,
    ) -> Result<PaymentReceipt, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Approve => {}
            Behaviour::Decline => return Err(GatewayError::Declined("card declined".to_string())),
            Behaviour::Hang => std::future::pending::<()>().await,
            Behaviour::Delay(delay) => tokio::time::sleep(delay).await,
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentReceipt {
            account_id: instruction.account_id,
            reference: instruction.reference.clone(),
            amount: instruction.amount,
            processor_reference: None,
        })
    }

    async fn lookup(&self, reference: &str) -> Result<Option<PaymentReceipt>, GatewayError> {
        match self.known {
            Some(true) => Ok(Some(PaymentReceipt {
                account_id: Uuid::nil(),
                reference: reference.to_string(),
                amount: Decimal::ZERO,
                processor_reference: None,
            })),
            Some(false) => Ok(None),
            None => Err(GatewayError::Declined("lookup unavailable".to_string())),
        }
    }
}

/// Wraps a [`MemoryStore`] and fails chosen operations on demand.
#[derive(Clone, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    pub fail_create: Arc<AtomicBool>,
    pub fail_mark_failed: Arc<AtomicBool>,
    pub fail_adjust: Arc<AtomicBool>,
    // another worker finalizes the entry just before our write lands
    pub finalize_first: Arc<AtomicBool>,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    fn outage() -> StoreError {
        StoreError::Database(sqlx::Error::PoolTimedOut)
    }

    async fn race(&self, id: Uuid) {
        if self.finalize_first.load(Ordering::SeqCst) {
            self.inner.mark_transaction_failed(id).await.unwrap();
        }
    }
}

#[async_trait]
impl LedgerStore for FaultyStore {
    async fn create_transaction(&self, entry: NewTransaction) -> Result<Transaction, StoreError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.inner.create_transaction(entry).await
    }

    async fn find_transaction_by_reference(&self, reference: &str) -> Result<Transaction, StoreError> {
        self.inner.find_transaction_by_reference(reference).await
    }

    async fn mark_transaction_failed(&self, id: Uuid) -> Result<Transaction, StoreError> {
        if self.fail_mark_failed.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.race(id).await;
        self.inner.mark_transaction_failed(id).await
    }
}

#[async_trait]
impl WalletStore for FaultyStore {
    async fn find_wallet_by_user(&self, user_id: Uuid) -> Result<Wallet, StoreError> {
        self.inner.find_wallet_by_user(user_id).await
    }

    async fn create_wallet(&self, user_id: Uuid, opening_balance: i64) -> Result<Wallet, StoreError> {
        self.inner.create_wallet(user_id, opening_balance).await
    }

    async fn adjust_balance_atomic(
        &self,
        wallet_id: Uuid,
        transaction: &Transaction,
        signed_amount: i64,
    ) -> Result<Wallet, StoreError> {
        if self.fail_adjust.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        self.race(transaction.id).await;
        self.inner
            .adjust_balance_atomic(wallet_id, transaction, signed_amount)
            .await
    }
}
