use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::store::{LedgerStoreRef, UserStoreRef, WalletStoreRef};
use crate::db::tx::{NewTransaction, Transaction, TransactionStatus, TransactionType};
use crate::db::utils::{to_display_units, to_minor_units};
use crate::db::wallet::Wallet;
use crate::error::{GatewayError, StoreError, TransferError};
use crate::gateway::{PaymentGatewayRef, PaymentInstruction};

pub const DEFAULT_PAYMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// A validated transfer request. `amount` is in display units (e.g. `100.00`).
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    Completed {
        transaction: Transaction,
        wallet: Wallet,
    },
    /// A debit the wallet could not cover. Nothing was written.
    InsufficientBalance { balance: Decimal, requested: Decimal },
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Completed { .. })
    }

    pub fn message(&self) -> &'static str {
        match self {
            TransferOutcome::Completed { .. } => "Transaction successful",
            TransferOutcome::InsufficientBalance { .. } => "Insufficient balance",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The processor holds the payment; the wallet has now been adjusted.
    Completed {
        transaction: Transaction,
        wallet: Wallet,
    },
    /// The processor never received the payment; the entry is now failed.
    MarkedFailed(Transaction),
    /// Nothing to do, the entry was already terminal.
    AlreadySettled(Transaction),
}

impl ReconcileOutcome {
    /// False when reconciliation settled the transfer as failed.
    pub fn is_success(&self) -> bool {
        match self {
            ReconcileOutcome::Completed { .. } => true,
            ReconcileOutcome::MarkedFailed(_) => false,
            ReconcileOutcome::AlreadySettled(transaction) => {
                transaction.status == TransactionStatus::Completed
            }
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ReconcileOutcome::Completed { .. } => "Transaction completed",
            ReconcileOutcome::MarkedFailed(_) => "Transaction marked as failed",
            ReconcileOutcome::AlreadySettled(_) => "Transaction already settled",
        }
    }
}

/// Orchestrates the ledger, the wallets and the payment processor.
///
/// The engine keeps no mutable state of its own; everything shared lives in
/// the stores, so one instance can serve any number of concurrent requests.
pub struct WalletLedgerEngine {
    users: UserStoreRef,
    wallets: WalletStoreRef,
    ledger: LedgerStoreRef,
    gateway: PaymentGatewayRef,
    payment_timeout: Duration,
}

impl WalletLedgerEngine {
    pub fn new(
        users: UserStoreRef,
        wallets: WalletStoreRef,
        ledger: LedgerStoreRef,
        gateway: PaymentGatewayRef,
    ) -> Self {
        Self {
            users,
            wallets,
            ledger,
            gateway,
            payment_timeout: DEFAULT_PAYMENT_TIMEOUT,
        }
    }

    pub fn with_payment_timeout(mut self, payment_timeout: Duration) -> Self {
        self.payment_timeout = payment_timeout;
        self
    }

    /// Moves `req.amount` into or out of the user's wallet.
    ///
    /// Preconditions are checked before anything is written. Once the pending
    /// ledger entry exists, exactly one of three things happens: the wallet is
    /// adjusted and the entry completed together, the entry is marked failed,
    /// or the error says which write could not be made.
    pub async fn transfer(&self, req: TransferRequest) -> Result<TransferOutcome, TransferError> {
        tracing::info!(
            "Starting {} of {} for user {} with reference {}",
            req.transaction_type,
            req.amount,
            req.user_id,
            req.reference
        );

        let amount = to_minor_units(req.amount)
            .filter(|amount| *amount > 0)
            .ok_or(TransferError::InvalidAmount)?;

        let user = self
            .users
            .find_user(req.user_id)
            .await
            .map_err(|err| match err {
                StoreError::NotFound(_) => TransferError::UserNotFound(req.user_id),
                source => TransferError::Lookup { what: "user", source },
            })?;

        let wallet = self
            .wallets
            .find_wallet_by_user(user.id)
            .await
            .map_err(|err| match err {
                StoreError::NotFound(_) => TransferError::WalletNotFound(user.id),
                source => TransferError::Lookup { what: "wallet", source },
            })?;

        if req.transaction_type == TransactionType::Debit && wallet.balance < amount {
            let balance = to_display_units(wallet.balance);
            tracing::warn!(
                "Insufficient balance for user {}: balance {}, requested {}",
                user.id,
                balance,
                req.amount
            );
            return Ok(TransferOutcome::InsufficientBalance {
                balance,
                requested: req.amount,
            });
        }

        let entry = NewTransaction::new(user.id, &req.reference, req.transaction_type, amount);
        let transaction = self
            .ledger
            .create_transaction(entry)
            .await
            .map_err(TransferError::TransactionCreateFailed)?;
        tracing::info!(
            "Transaction {} pending with reference {}",
            transaction.id,
            transaction.reference
        );

        let instruction = PaymentInstruction {
            account_id: user.id,
            reference: req.reference.clone(),
            amount: req.amount,
        };
        if let Err(payment) = self.pay(&instruction).await {
            tracing::error!("Payment failed for reference {}: {}", req.reference, payment);
            return match self.ledger.mark_transaction_failed(transaction.id).await {
                Ok(_) => {
                    tracing::info!("Transaction {} marked as failed", transaction.id);
                    Err(TransferError::PaymentFailed(payment))
                }
                Err(source) => {
                    tracing::error!(
                        "Transaction {} needs manual reconciliation: {}",
                        transaction.id,
                        source
                    );
                    Err(TransferError::TransactionUpdateFailed {
                        id: transaction.id,
                        payment,
                        source,
                    })
                }
            };
        }

        let wallet = self.settle(&wallet, &transaction).await?;
        let transaction = Transaction {
            status: TransactionStatus::Completed,
            updated_at: wallet.updated_at,
            ..transaction
        };
        tracing::info!(
            "Transaction {} completed, wallet {} balance now {}",
            transaction.id,
            wallet.id,
            wallet.balance
        );

        Ok(TransferOutcome::Completed { transaction, wallet })
    }

    pub async fn find_transaction(&self, reference: &str) -> Result<Transaction, TransferError> {
        self.ledger
            .find_transaction_by_reference(reference)
            .await
            .map_err(|err| match err {
                StoreError::NotFound(_) => TransferError::TransactionNotFound(reference.to_string()),
                source => TransferError::Lookup {
                    what: "transaction",
                    source,
                },
            })
    }

    /// Settles a transaction left `pending`, typically after a wallet update
    /// failed once the payment had gone through.
    ///
    /// The processor is the authority on whether the money moved: a payment it
    /// knows about is applied to the wallet, anything else is marked failed.
    /// Entries younger than the payment timeout are left alone because their
    /// original call may still be in flight.
    pub async fn reconcile(&self, reference: &str) -> Result<ReconcileOutcome, TransferError> {
        let transaction = self.find_transaction(reference).await?;
        if transaction.status.is_terminal() {
            return Ok(ReconcileOutcome::AlreadySettled(transaction));
        }

        let age = (Utc::now() - transaction.created_at)
            .to_std()
            .unwrap_or_default();
        if age < self.payment_timeout {
            return Err(TransferError::StillInFlight(reference.to_string()));
        }

        let receipt = tokio::time::timeout(self.payment_timeout, self.gateway.lookup(reference))
            .await
            .unwrap_or(Err(GatewayError::Timeout(self.payment_timeout)))
            .map_err(TransferError::PaymentLookupFailed)?;

        match receipt {
            Some(_) => {
                let wallet = self
                    .wallets
                    .find_wallet_by_user(transaction.user_id)
                    .await
                    .map_err(|err| match err {
                        StoreError::NotFound(_) => {
                            TransferError::WalletNotFound(transaction.user_id)
                        }
                        source => TransferError::Lookup { what: "wallet", source },
                    })?;
                match self.settle(&wallet, &transaction).await {
                    Ok(wallet) => {
                        tracing::info!("Reconciled transaction {} as completed", transaction.id);
                        Ok(ReconcileOutcome::Completed {
                            transaction: Transaction {
                                status: TransactionStatus::Completed,
                                updated_at: wallet.updated_at,
                                ..transaction
                            },
                            wallet,
                        })
                    }
                    Err(TransferError::WalletUpdateFailed(StoreError::AlreadyFinalized { .. })) => {
                        Ok(ReconcileOutcome::AlreadySettled(self.find_transaction(reference).await?))
                    }
                    Err(err) => Err(err),
                }
            }
            None => match self.ledger.mark_transaction_failed(transaction.id).await {
                Ok(failed) => {
                    tracing::info!("Reconciled transaction {} as failed", failed.id);
                    Ok(ReconcileOutcome::MarkedFailed(failed))
                }
                // settled by someone else since we read it
                Err(StoreError::AlreadyFinalized { .. }) => {
                    let settled = self.find_transaction(reference).await?;
                    tracing::info!(
                        "Transaction {} was settled as {} during reconciliation",
                        settled.id,
                        settled.status
                    );
                    Ok(ReconcileOutcome::AlreadySettled(settled))
                }
                Err(source) => Err(TransferError::ReconcileUpdateFailed {
                    id: transaction.id,
                    source,
                }),
            },
        }
    }

    // A call that outlives the deadline is dropped, so a late answer can never
    // be observed here.
    async fn pay(&self, instruction: &PaymentInstruction) -> Result<(), GatewayError> {
        let call = self.gateway.pay(instruction, self.payment_timeout);
        match tokio::time::timeout(self.payment_timeout, call).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(GatewayError::Timeout(self.payment_timeout)),
        }
    }

    async fn settle(&self, wallet: &Wallet, transaction: &Transaction) -> Result<Wallet, TransferError> {
        let signed_amount = transaction.transaction_type.signed(transaction.amount);
        self.wallets
            .adjust_balance_atomic(wallet.id, transaction, signed_amount)
            .await
            .map_err(|err| {
                tracing::error!(
                    "Failed to {} wallet {} for transaction {}: {}",
                    transaction.transaction_type,
                    wallet.id,
                    transaction.id,
                    err
                );
                TransferError::WalletUpdateFailed(err)
            })
    }
}
