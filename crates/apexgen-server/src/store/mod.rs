// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Store interface and backend for apexgen-server.
//!
//! Defines the abstraction over the relational store (resource request views,
//! the template table, user tokens, and the status ledger) plus the
//! PostgreSQL implementation.

pub mod postgres;

pub use self::postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogEntry;

/// Errors from store operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Other error (used by test doubles for fault injection).
    #[error("{0}")]
    Other(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Flat attribute mapping for one resource request row.
///
/// Column names are the keys; the `sg_rules` key holds the associated
/// security-group rules as a JSON array (possibly empty).
pub type ResourceData = serde_json::Map<String, serde_json::Value>;

/// One security-group ingress rule attached to a resource request.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SecurityGroupRule {
    /// First port of the allowed range.
    pub from_port: i32,
    /// Last port of the allowed range.
    pub to_port: i32,
    /// Network protocol (tcp, udp, ...).
    pub protocol: String,
    /// Source CIDR block.
    pub cidr: String,
    /// Free-text rule description.
    pub description: Option<String>,
}

/// Lifecycle state of one generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationState {
    /// Attempt accepted, pipeline running.
    Started,
    /// Attempt ended on a failed gate or an upstream fault.
    Failed,
    /// Merge request created.
    Success,
}

impl GenerationState {
    /// Uppercase identifier as stored in the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Started => "STARTED",
            GenerationState::Failed => "FAILED",
            GenerationState::Success => "SUCCESS",
        }
    }
}

impl std::fmt::Display for GenerationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One write into the status ledger.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    /// Apex request id this attempt belongs to (ledger key).
    pub apex_request_id: i64,
    /// User who triggered the attempt.
    pub username: String,
    /// Cloud identifier from the request.
    pub cloud_id: String,
    /// Resource type from the request.
    pub resource_type: String,
    /// New lifecycle state.
    pub state: GenerationState,
    /// Human-readable outcome message.
    pub message: String,
    /// Merge request URL, set on success.
    pub merge_request_url: Option<String>,
}

/// Ledger row as returned by the history endpoint.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusRecord {
    /// Apex request id (ledger key).
    pub apex_request_id: i64,
    /// User who triggered the attempt.
    pub username: String,
    /// Cloud identifier.
    pub cloud_id: String,
    /// Resource type.
    pub resource_type: String,
    /// Lifecycle state (STARTED, FAILED, SUCCESS).
    pub status: String,
    /// Outcome message.
    pub message: String,
    /// Merge request URL if the attempt succeeded.
    pub merge_request_url: Option<String>,
    /// When the attempt was accepted.
    pub started_at: DateTime<Utc>,
    /// When the attempt reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Maximum number of ledger rows returned per history query.
pub const HISTORY_LIMIT: i64 = 20;

/// Abstraction over the relational store.
///
/// Backends are PURE data access - no orchestration decisions. Which absences
/// are fatal, and in what order lookups run, is the orchestrator's business.
///
/// Fault contract per method:
/// - `fetch_resource` propagates faults on the primary row ("store
///   unreachable" is not "no such resource"); faults on the secondary
///   security-group query degrade to an empty rule list.
/// - `fetch_template` propagates faults; the template cache in front of it
///   maps them to a miss.
/// - `fetch_gitlab_token` and `fetch_project_id` degrade faults to `None`.
/// - `upsert_status` propagates faults; callers isolate them (ledger writes
///   are telemetry, not a transactional step).
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch one resource request row plus its security-group rules.
    ///
    /// Returns `Ok(None)` when no row matches the id.
    async fn fetch_resource(
        &self,
        entry: &CatalogEntry,
        request_id: i64,
    ) -> Result<Option<ResourceData>>;

    /// Fetch the template text for a (cloud, resource type, module version) key.
    async fn fetch_template(
        &self,
        cloud_id: &str,
        resource_type: &str,
        module_version: &str,
    ) -> Result<Option<String>>;

    /// Fetch the GitLab access token stored for a user.
    async fn fetch_gitlab_token(&self, username: &str) -> Result<Option<String>>;

    /// Fetch the GitLab project id recorded on a resource request row.
    async fn fetch_project_id(
        &self,
        entry: &CatalogEntry,
        request_id: i64,
    ) -> Result<Option<i64>>;

    /// Insert or update the ledger row for an apex request id.
    async fn upsert_status(&self, update: &StatusUpdate) -> Result<()>;

    /// Ledger rows for a user, newest first, at most [`HISTORY_LIMIT`].
    async fn status_history(&self, username: &str) -> Result<Vec<StatusRecord>>;
}
