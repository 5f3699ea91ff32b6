// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Apexgen - Terraform Merge-Request Generation Server
//!
//! An HTTP server responsible for:
//! - Generating Terraform configurations from stored resource requests
//! - Publishing them to GitLab as merge requests
//! - Journaling every attempt into the status ledger

use std::sync::Arc;

use tracing::{info, warn};

use apexgen_server::config::Config;
use apexgen_server::gitlab::GitLabClient;
use apexgen_server::handlers::AppState;
use apexgen_server::store::PgStore;
use apexgen_server::{migrations, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "apexgen_server=info,tower_http=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    // Load configuration
    let config = Config::from_env()?;

    info!(
        http_addr = %config.http_addr,
        gitlab_api_url = %config.gitlab_api_url,
        api_key_gate = config.api_key.is_some(),
        "Starting Apexgen"
    );

    // Connect to database
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.db_pool_max)
        .connect(&config.database_url)
        .await?;

    info!("Connected to database");

    // Apply owned schema (the status ledger)
    migrations::run(&pool).await?;

    info!("Database schema verified");

    let state = Arc::new(AppState::new(
        Arc::new(PgStore::new(pool)),
        GitLabClient::new(&config.gitlab_api_url),
        config.api_key.clone(),
    ));

    server::serve(config.http_addr, state).await?;

    info!("Apexgen shut down");

    Ok(())
}
