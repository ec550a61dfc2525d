use std::process;
use std::sync::Arc;

use axum::Router;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt::{writer::BoxMakeWriter, Layer}, layer::SubscriberExt, EnvFilter, Registry};

use backend_wallet_ledger::config::Config;
use backend_wallet_ledger::db::ledger::TransactionRepository;
use backend_wallet_ledger::db::user::UserRepository;
use backend_wallet_ledger::db::wallet::WalletRepository;
use backend_wallet_ledger::engine::WalletLedgerEngine;
use backend_wallet_ledger::gateway::{HttpPaymentGateway, PaymentGatewayRef, SandboxGateway};
use backend_wallet_ledger::routes;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            process::exit(1);
        }
    };

    // add tracing layer
    let file_appender = tracing_appender::rolling::never(".", &config.log_file);
    let (file_writer, _file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, _stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    // json into the log file, plain text on stdout
    let file_layer = Layer::new().json().with_writer(BoxMakeWriter::new(move || file_writer.clone()));
    let stdout_layer = Layer::new().with_writer(BoxMakeWriter::new(move || stdout_writer.clone()));

    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(file_layer)
        .with(stdout_layer);

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Unable to set global subscriber: {err}");
        process::exit(1);
    }

    let database_pool = match process_database(&config.database_url, config.max_connection_pooling).await {
        Ok(db) => {
            tracing::info!("Connected to database");
            db
        },
        Err(err) => {
            tracing::error!("Failed to connect to database: {}", err);
            process::exit(1);
        }
    };

    let listener = match TcpListener::bind(("0.0.0.0", config.port)).await {
        Ok(listener) => {
            tracing::info!("Listening on port: {}", config.port);
            listener
        }
        Err(err) => {
            tracing::error!("Failed to bind to port: {}", err);
            process::exit(1);
        }
    };

    let router = process_begin(database_pool, &config);
    tracing::info!("Routes constructed successfully");

    //start the http service
    let http_service = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = http_service.await {
        tracing::error!("Failed to start server: {}", err);
        process::exit(1);
    }
    tracing::info!("Server stopped");
}

fn process_begin(db_pool: PgPool, config: &Config) -> Router {
    let gateway: PaymentGatewayRef = match &config.payment_gateway_url {
        Some(url) => {
            tracing::info!("Using payment gateway at {}", url);
            match HttpPaymentGateway::new(url) {
                Ok(gateway) => Arc::new(gateway),
                Err(err) => {
                    tracing::error!("Failed to configure payment gateway: {}", err);
                    process::exit(1);
                }
            }
        }
        None => {
            tracing::warn!("PAYMENT_GATEWAY_URL not set, payments go to the sandbox gateway");
            Arc::new(SandboxGateway::new())
        }
    };

    let engine = WalletLedgerEngine::new(
        Arc::new(UserRepository::new(db_pool.clone())),
        Arc::new(WalletRepository::new(db_pool.clone())),
        Arc::new(TransactionRepository::new(db_pool)),
        gateway,
    )
    .with_payment_timeout(config.payment_timeout);

    routes::app(Arc::new(engine), Arc::new(config.rules.clone()))
}

async fn process_database(url: &str, max_conn_pool: u32) -> Result<PgPool, String> {
    // create a connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(max_conn_pool)
        .connect(url)
        .await
        .map_err(|err| format!("Failed to connect to database: {}", err))?;

    match sqlx::migrate!("./migrations").run(&db_pool).await {
        Ok(_) => {
            tracing::info!("Migrations run successfully");
        },
        Err(err) => {
            // if it fails we assume to continue believing that the database is already migrated
            tracing::warn!("Failed to run migrations: {err}");
        },
    }

    Ok(db_pool)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        // keep serving, there is no way to be told to stop
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
