// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Apexgen - Terraform Merge-Request Generation
//!
//! This crate turns stored Apex resource requests into Terraform
//! configuration files and opens GitLab merge requests with them. The
//! pipeline per request: read the resource row from PostgreSQL, render the
//! stored template for its module version, sanity-check the artifact, and
//! publish it through the GitLab REST API, journaling every attempt into a
//! status ledger.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         External Clients                                 │
//! │                     (Apex portal, operators)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │ HTTP
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     apexgen-server (This Crate)                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐     │
//! │  │  Resource   │  │  Template   │  │  Renderer + │  │   Status    │     │
//! │  │   Lookup    │  │    Cache    │  │  Validator  │  │   Ledger    │     │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └─────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//!           │                                              │
//!           │ SQL                                          │ REST
//!           ▼                                              ▼
//! ┌───────────────────────┐                  ┌─────────────────────────┐
//! │      PostgreSQL       │                  │         GitLab          │
//! │ (requests, templates, │                  │ (branches, files, merge │
//! │  users, status)       │                  │        requests)        │
//! └───────────────────────┘                  └─────────────────────────┘
//! ```
//!
//! # HTTP API
//!
//! | Route | Description |
//! |-------|-------------|
//! | `POST /api/v1/generate` | Run one generation attempt for a request id |
//! | `GET /api/v1/status/{username}` | Last 20 ledger rows for a user |
//! | `GET /health` | Liveness and version |
//!
//! The `/api/v1` routes are gated by the `x-api-key` header when
//! `APEXGEN_API_KEY` is configured.
//!
//! # Generation Status State Machine
//!
//! ```text
//!      ┌─────────┐
//!      │ STARTED │
//!      └────┬────┘
//!           │ gate sequence
//!     ┌─────┴─────┐
//!     │           │
//!     ▼           ▼
//! ┌────────┐ ┌─────────┐
//! │ FAILED │ │ SUCCESS │
//! └────────┘ └─────────┘
//! ```
//!
//! One ledger row per apex request id; a retried generation re-arms the same
//! row rather than inserting a second one. Concurrent attempts for the same
//! id are not mutually excluded: the last terminal writer wins.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `APEXGEN_DATABASE_URL` | Yes* | - | PostgreSQL connection string |
//! | `DATABASE_URL` | Yes* | - | Fallback if above not set |
//! | `APEXGEN_HTTP_PORT` | No | `8080` | HTTP listen port |
//! | `GITLAB_API_URL` | No | `https://gitlab.com/api/v4` | GitLab REST base URL |
//! | `APEXGEN_API_KEY` | No | - | Shared secret for the API routes |
//! | `APEXGEN_DB_POOL_MAX` | No | `10` | Database pool size |
//!
//! # Modules
//!
//! - [`catalog`]: Closed allow-list of (cloud, resource type) pairs
//! - [`config`]: Server configuration from environment variables
//! - [`error`]: Error types for the generation pipeline
//! - [`gitlab`]: GitLab REST client for publication
//! - [`handlers`]: Generation, history, and health handlers
//! - [`migrations`]: Owned schema (the status ledger)
//! - [`render`]: Tera rendering with Terraform formatting filters
//! - [`server`]: Axum router and serve loop
//! - [`store`]: Store trait and the PostgreSQL backend
//! - [`template_cache`]: TTL/LRU memoization of template lookups
//! - [`validate`]: Structural checks on rendered configurations

#![deny(missing_docs)]

/// Closed catalog of supported (cloud, resource type) pairs.
pub mod catalog;

/// Server configuration loaded from environment variables.
pub mod config;

/// Error types for the generation pipeline.
pub mod error;

/// GitLab REST client for publishing configurations.
pub mod gitlab;

/// Generation pipeline handlers.
pub mod handlers;

/// Database migrations for the owned schema.
pub mod migrations;

/// Template rendering with Terraform formatting filters.
pub mod render;

/// HTTP server for the generation API.
pub mod server;

/// Store interface and PostgreSQL backend.
pub mod store;

/// Time-bounded memoization of template lookups.
pub mod template_cache;

/// Structural checks on rendered configurations.
pub mod validate;

pub use config::Config;
pub use error::Error;
