// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for apexgen-server.

use std::net::SocketAddr;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string
    pub database_url: String,
    /// HTTP listen address for the API
    pub http_addr: SocketAddr,
    /// Base URL of the GitLab REST API (v4)
    pub gitlab_api_url: String,
    /// Shared secret expected in the `x-api-key` header; `None` disables the gate
    pub api_key: Option<String>,
    /// Maximum connections held by the database pool
    pub db_pool_max: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("APEXGEN_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| ConfigError::MissingEnvVar("APEXGEN_DATABASE_URL or DATABASE_URL"))?;

        let port: u16 = std::env::var("APEXGEN_HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let http_addr = SocketAddr::from(([0, 0, 0, 0], port));

        let gitlab_api_url = std::env::var("GITLAB_API_URL")
            .unwrap_or_else(|_| "https://gitlab.com/api/v4".to_string());

        // The API-key gate is optional: unset means the endpoints are open,
        // which is only appropriate behind a trusted ingress.
        let api_key = std::env::var("APEXGEN_API_KEY").ok().filter(|k| !k.is_empty());

        let db_pool_max: u32 = std::env::var("APEXGEN_DB_POOL_MAX")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPoolSize)?;

        Ok(Self {
            database_url,
            http_addr,
            gitlab_api_url,
            api_key,
            db_pool_max,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// The port number is invalid.
    #[error("Invalid port number")]
    InvalidPort,
    /// The pool size is invalid.
    #[error("Invalid database pool size")]
    InvalidPoolSize,
}
