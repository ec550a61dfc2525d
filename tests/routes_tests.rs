mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use backend_wallet_ledger::config::RequestRules;
use backend_wallet_ledger::db::memory::MemoryStore;
use backend_wallet_ledger::db::store::{LedgerStore, WalletStore};
use backend_wallet_ledger::db::tx::{NewTransaction, TransactionType};
use backend_wallet_ledger::routes::{self, utils::TransactionResponse};
use common::{engine, seeded, Behaviour, ScriptedGateway};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn app(store: &MemoryStore, behaviour: Behaviour) -> Router {
    let engine = engine(store, ScriptedGateway::new(behaviour))
        .with_payment_timeout(Duration::from_millis(50));
    routes::app(Arc::new(engine), Arc::new(RequestRules::default()))
}

async fn post_json(app: Router, uri: &str, body: String) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn transfer(app: Router, body: Value) -> (StatusCode, TransactionResponse) {
    let (status, value) = post_json(app, "/v1/transactions", body.to_string()).await;
    (status, serde_json::from_value(value).unwrap())
}

#[tokio::test]
async fn test_successful_debit() {
    let (store, user, _) = seeded(20_000).await;
    let (status, body) = transfer(
        app(&store, Behaviour::Approve),
        json!({"amount": 100.00, "user_id": user.id, "type": "debit", "reference": "R1"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, TransactionResponse::new(true, "Transaction successful"));
    assert_eq!(store.find_wallet_by_user(user.id).await.unwrap().balance, 10_000);
}

#[tokio::test]
async fn test_amount_as_string_is_accepted() {
    let (store, user, _) = seeded(0).await;
    let (status, body) = transfer(
        app(&store, Behaviour::Approve),
        json!({"amount": "12.34", "user_id": user.id, "type": "credit", "reference": "S1"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.success);
    assert_eq!(store.find_wallet_by_user(user.id).await.unwrap().balance, 1_234);
}

#[tokio::test]
async fn test_insufficient_balance_is_not_a_fault() {
    let (store, user, _) = seeded(5_000).await;
    let (status, body) = transfer(
        app(&store, Behaviour::Approve),
        json!({"amount": 100.00, "user_id": user.id, "type": "debit", "reference": "R2"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, TransactionResponse::new(false, "Insufficient balance"));
}

#[tokio::test]
async fn test_malformed_json() {
    let store = MemoryStore::new();
    let (status, body) = post_json(
        app(&store, Behaviour::Approve),
        "/v1/transactions",
        "{not json".to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid request payload");
}

#[tokio::test]
async fn test_unknown_fields_are_rejected() {
    let store = MemoryStore::new();
    let (status, body) = transfer(
        app(&store, Behaviour::Approve),
        json!({"amount": 1, "user_id": Uuid::new_v4(), "type": "credit", "reference": "X", "currency": "EUR"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.message, "Invalid request payload");
}

#[tokio::test]
async fn test_validation_failures() {
    let store = MemoryStore::new();
    let cases = [
        (json!({"user_id": Uuid::new_v4(), "type": "credit", "reference": "X"}), "amount: is required"),
        (json!({"amount": -1, "user_id": Uuid::new_v4(), "type": "credit", "reference": "X"}), "amount: must be positive"),
        (json!({"amount": 1, "user_id": "user123", "type": "credit", "reference": "X"}), "user_id: must be a valid uuid"),
        (json!({"amount": 1, "user_id": Uuid::new_v4(), "type": "refund", "reference": "X"}), "type: must be one of credit debit"),
        (json!({"amount": 1, "user_id": Uuid::new_v4(), "type": "credit", "reference": ""}), "reference: must not be empty"),
    ];

    for (payload, message) in cases {
        let (status, body) = transfer(app(&store, Behaviour::Approve), payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, TransactionResponse::new(false, message));
    }
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let store = MemoryStore::new();
    let (status, body) = transfer(
        app(&store, Behaviour::Approve),
        json!({"amount": 1, "user_id": Uuid::new_v4(), "type": "credit", "reference": "X"}),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, TransactionResponse::new(false, "User not found"));
}

#[tokio::test]
async fn test_duplicate_reference_is_conflict() {
    let (store, user, _) = seeded(0).await;
    let payload = json!({"amount": 1, "user_id": user.id, "type": "credit", "reference": "DUP"});

    let (first, _) = transfer(app(&store, Behaviour::Approve), payload.clone()).await;
    let (second, body) = transfer(app(&store, Behaviour::Approve), payload).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body, TransactionResponse::new(false, "Transaction already exists"));
}

#[tokio::test]
async fn test_payment_timeout_is_bad_gateway() {
    let (store, user, _) = seeded(20_000).await;
    let (status, body) = transfer(
        app(&store, Behaviour::Hang),
        json!({"amount": 100, "user_id": user.id, "type": "debit", "reference": "R3"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, TransactionResponse::new(false, "Failed to make payment"));
    assert_eq!(store.find_wallet_by_user(user.id).await.unwrap().balance, 20_000);
}

#[tokio::test]
async fn test_get_transaction_by_reference() {
    let (store, user, _) = seeded(0).await;
    transfer(
        app(&store, Behaviour::Approve),
        json!({"amount": 2.5, "user_id": user.id, "type": "credit", "reference": "GET1"}),
    )
    .await;

    let response = app(&store, Behaviour::Approve)
        .oneshot(
            Request::builder()
                .uri("/v1/transactions/GET1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let entry: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(entry["reference"], "GET1");
    assert_eq!(entry["amount"], 250);
    assert_eq!(entry["type"], TransactionType::Credit.to_string());
    assert_eq!(entry["status"], "completed");
    assert_eq!(entry["user_id"], user.id.to_string());
}

#[tokio::test]
async fn test_get_missing_transaction() {
    let store = MemoryStore::new();
    let response = app(&store, Behaviour::Approve)
        .oneshot(
            Request::builder()
                .uri("/v1/transactions/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reconcile_settled_transaction() {
    let (store, user, _) = seeded(0).await;
    transfer(
        app(&store, Behaviour::Approve),
        json!({"amount": 1, "user_id": user.id, "type": "credit", "reference": "DONE"}),
    )
    .await;

    let (status, body) = post_json(
        app(&store, Behaviour::Approve),
        "/v1/transactions/DONE/reconcile",
        String::new(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Transaction already settled");
}

#[tokio::test]
async fn test_reconcile_to_failed_is_not_a_success() {
    let (store, user, _) = seeded(0).await;
    let mut entry = NewTransaction::new(user.id, "LOST", TransactionType::Credit, 100);
    entry.created_at -= chrono::Duration::minutes(1);
    store.create_transaction(entry).await.unwrap();
    let engine = engine(&store, ScriptedGateway::with_lookup(Behaviour::Approve, false));
    let app = routes::app(Arc::new(engine), Arc::new(RequestRules::default()));

    let (status, body) = post_json(app, "/v1/transactions/LOST/reconcile", String::new()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Transaction marked as failed");
}
