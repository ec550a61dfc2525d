use std::sync::Arc;

use axum::Router;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::RequestRules;
use crate::engine::WalletLedgerEngine;

pub mod tx;
pub mod utils;

// transfer payloads are tiny
const BODY_LIMIT: usize = 16 * 1024;

pub fn app(engine: Arc<WalletLedgerEngine>, rules: Arc<RequestRules>) -> Router {
    let transfer_routes =
        tx::tx_route(engine, rules).route_layer(CompressionLayer::new().gzip(true));

    Router::new()
        .nest("/v1", transfer_routes)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
}
