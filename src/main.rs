// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wedding Planner API Server
//!
//! Serves profiles, shared wedding sessions, the task checklist, a live
//! update feed and AI vendor suggestions to the web front end.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wedding_planner::{
    config::{Config, StoreBackend},
    db::{firestore::FirestoreStore, memory::MemoryStore, Db},
    services::{FirebaseTokenVerifier, GeminiModel, VendorService},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Wedding Planner API");

    let db = match config.store_backend {
        StoreBackend::Firestore => {
            let store = FirestoreStore::new(&config.gcp_project_id)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to Firestore: {e}"))?;
            tracing::info!(project = %config.gcp_project_id, "Using Firestore store");
            Db::new(Arc::new(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Db::new(Arc::new(MemoryStore::new()))
        }
    };

    let vendors = match &config.gemini_api_key {
        Some(key) => {
            let model = GeminiModel::new(key.clone(), config.gemini_model.clone())?;
            tracing::info!(model = %config.gemini_model, "Vendor suggestions enabled");
            VendorService::new(Arc::new(model))
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set; vendor suggestions disabled");
            VendorService::unconfigured()
        }
    };

    let identity = Arc::new(FirebaseTokenVerifier::new(&config)?);

    let state = Arc::new(AppState::new(config.clone(), db, vendors, identity));
    let app = wedding_planner::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wedding_planner=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
