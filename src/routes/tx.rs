use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::utils::{status_for, TransactionResponse, TransferPayload};
use crate::config::RequestRules;
use crate::engine::WalletLedgerEngine;

type TxState = (Arc<WalletLedgerEngine>, Arc<RequestRules>);

async fn create_transaction(
    State((engine, rules)): State<TxState>,
    payload: Result<Json<TransferPayload>, JsonRejection>,
) -> (StatusCode, Json<TransactionResponse>) {
    tracing::info!("Starting transaction creation process");

    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!("Invalid request payload: {err}");
            return (
                StatusCode::BAD_REQUEST,
                Json(TransactionResponse::new(false, "Invalid request payload")),
            );
        }
    };

    let request = match payload.validate(&rules) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!("Request validation failed: {err}");
            return (
                StatusCode::BAD_REQUEST,
                Json(TransactionResponse::new(false, err.to_string())),
            );
        }
    };

    let reference = request.reference.clone();
    match engine.transfer(request).await {
        Ok(outcome) => {
            tracing::info!("Transaction {reference}: {}", outcome.message());
            (
                StatusCode::OK,
                Json(TransactionResponse::new(outcome.is_success(), outcome.message())),
            )
        }
        Err(err) => {
            tracing::error!("Transaction {reference} failed: {err}");
            (
                status_for(&err),
                Json(TransactionResponse::new(false, err.message())),
            )
        }
    }
}

// return a ledger entry by the reference it was submitted with
async fn get_transaction(
    State((engine, _)): State<TxState>,
    Path(reference): Path<String>,
) -> impl IntoResponse {
    match engine.find_transaction(&reference).await {
        Ok(transaction) => Ok((StatusCode::OK, Json(transaction))),
        Err(err) => {
            tracing::error!("Failed to retrieve transaction {reference}: {err}");
            Err((
                status_for(&err),
                Json(TransactionResponse::new(false, err.message())),
            ))
        }
    }
}

async fn reconcile_transaction(
    State((engine, _)): State<TxState>,
    Path(reference): Path<String>,
) -> (StatusCode, Json<TransactionResponse>) {
    match engine.reconcile(&reference).await {
        Ok(outcome) => {
            tracing::info!("Reconciled {reference}: {}", outcome.message());
            (
                StatusCode::OK,
                Json(TransactionResponse::new(outcome.is_success(), outcome.message())),
            )
        }
        Err(err) => {
            tracing::error!("Failed to reconcile {reference}: {err}");
            (
                status_for(&err),
                Json(TransactionResponse::new(false, err.message())),
            )
        }
    }
}

pub fn tx_route(engine: Arc<WalletLedgerEngine>, rules: Arc<RequestRules>) -> Router {
    Router::new()
        .route("/transactions", post(create_transaction))
        .route("/transactions/:reference", get(get_transaction))
        .route("/transactions/:reference/reconcile", post(reconcile_transaction))
        .with_state((engine, rules))
}
