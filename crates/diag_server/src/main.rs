//! diag_server — standalone REST server for the diagnostics system.
//!
//! Reads config from env vars:
//!   DIAG_DATABASE_URL — Postgres connection string (required)
//!   DIAG_BIND_ADDR    — listen address (default: 0.0.0.0:4200)

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use diag_core::{DiagService, DiagServiceImpl};
use diag_postgres::PgStores;
use diag_server::router::build_router;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,diag_server=debug".into()),
        )
        .init();

    let database_url =
        std::env::var("DIAG_DATABASE_URL").expect("DIAG_DATABASE_URL must be set");
    let bind_addr = std::env::var("DIAG_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:4200".into());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("failed to connect to database");
    tracing::info!("Connected to database");

    let stores = PgStores::new(pool);
    let service: Arc<dyn DiagService> = Arc::new(DiagServiceImpl::new(
        stores.assessments,
        stores.snapshots,
        stores.classrooms,
        stores.audit,
    ));

    let app = build_router(service);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {bind_addr}: {e}"));
    tracing::info!("diag_server listening on {bind_addr}");

    axum::serve(listener, app).await.expect("server error");
}
