// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Convoy-Tracker service
//!
//! Hosts the push intake endpoint, replays undelivered samples at startup,
//! and resolves any trip that was already underway before serving.

use convoy_tracker::{
    config::Config,
    services::{LogAnnouncer, RelayClient, SyncReconciler, TripBackend, ViewerRegistry},
    store::{PointLog, SessionStore},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        port = config.port,
        group_id = config.group_id,
        "Starting Convoy-Tracker"
    );

    // Open the local stores
    let point_log = PointLog::open(&config.data_dir).expect("Failed to open point log");
    let session = SessionStore::open(&config.data_dir).expect("Failed to open session store");

    // Relay backend client
    let backend: Arc<dyn TripBackend> = Arc::new(RelayClient::from_config(&config));

    // Sweep any samples a previous run left undelivered. The reconciler
    // logs its own per-sweep summary.
    let reconciler = SyncReconciler::new(Arc::clone(&backend), point_log.clone());
    if let Err(e) = reconciler.reconcile().await {
        tracing::warn!(error = %e, "Startup reconcile sweep failed");
    }

    // Viewer registry: one viewer per followed group
    let registry = Arc::new(ViewerRegistry::new(
        Arc::clone(&backend),
        point_log.clone(),
        session.clone(),
        Arc::new(LogAnnouncer),
        config.home_point,
    ));

    // Catch up on our own group's trip, if a previous run left one underway
    match registry.load_active_trip(config.group_id).await {
        Ok(outcome) => tracing::info!(outcome = ?outcome, "Active trip load finished"),
        Err(e) => tracing::warn!(error = %e, "Active trip load failed"),
    }

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        registry,
    });

    // Build router
    let app = convoy_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("convoy_tracker=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
