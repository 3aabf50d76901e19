mod auth;
mod booking;
mod config;
mod document;
mod middleware;
mod services;
mod storage;
mod store;

mod db;
mod error;
mod models;
mod routes;

use std::sync::Arc;

use crate::{
    config::Config,
    db::{PgBookingStore, PgDocumentStore},
    models::AppState,
    services::cleanup::{self, SweepSettings},
    storage::LocalStorage,
};

use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url, cfg.db_max_connections).await?;

    let storage = LocalStorage::new(cfg.storage_root.clone());
    storage.ensure_root().await?;
    tracing::info!(root = %cfg.storage_root.display(), "document storage ready");

    let state = AppState {
        db: pool.clone(),
        bookings: Arc::new(PgBookingStore::new(pool.clone())),
        documents: Arc::new(PgDocumentStore::new(pool)),
        storage: Arc::new(storage),
        token_ttl_hours: cfg.token_ttl_hours,
        max_upload_bytes: cfg.max_upload_bytes,
    };

    let shutdown = CancellationToken::new();
    let sweeps = cleanup::spawn_sweeps(
        &state,
        SweepSettings {
            period: cfg.cleanup_interval,
            document_retention: cfg.document_retention,
        },
        shutdown.clone(),
    );

    // The SPA is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_ctrl_c(shutdown.clone()))
        .await?;

    shutdown.cancel();
    for handle in sweeps {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "sweep task panicked");
        }
    }
    tracing::info!("shut down");
    Ok(())
}

async fn wait_for_ctrl_c(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for ctrl-c");
        return;
    }
    tracing::info!("ctrl-c received, shutting down");
    shutdown.cancel();
}
