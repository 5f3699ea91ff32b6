// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for apexgen-server.

use thiserror::Error;

/// Generation pipeline errors.
///
/// Variants split into the three classes the API distinguishes: absent rows
/// (`*NotFound`), rejected input or artifacts (`MissingModuleVersion`,
/// `InvalidArtifact`), and upstream faults (`Store`, `Render`, `GitLab`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Store query failed.
    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// Template rendering failed.
    #[error("Template rendering failed: {0}")]
    Render(#[from] tera::Error),

    /// GitLab API operation failed.
    #[error("GitLab error: {0}")]
    GitLab(#[from] crate::gitlab::GitLabError),

    /// No resource row exists for the requested key, or the (cloud,
    /// resource_type) pair is outside the catalog.
    #[error("Resource not found for {cloud_id}/{resource_type}/{request_id}")]
    ResourceNotFound {
        /// Cloud identifier from the request.
        cloud_id: String,
        /// Resource type from the request.
        resource_type: String,
        /// Apex request id from the request.
        request_id: i64,
    },

    /// The resource row carries no module_version attribute.
    #[error("Module version missing on resource request {0}")]
    MissingModuleVersion(i64),

    /// No template row matches the (cloud, resource_type, module_version) key.
    #[error("Template not found for {cloud_id}/{resource_type}/{module_version}")]
    TemplateNotFound {
        /// Cloud identifier from the request.
        cloud_id: String,
        /// Resource type from the request.
        resource_type: String,
        /// Module version read from the resource row.
        module_version: String,
    },

    /// The rendered configuration failed the structural checks.
    #[error("Generated Terraform configuration failed validation")]
    InvalidArtifact {
        /// One message per failed check.
        errors: Vec<String>,
        /// The rendered text, echoed back for debugging.
        rendered: String,
    },

    /// No GitLab token is stored for the user.
    #[error("GitLab token not found for user {0}")]
    TokenNotFound(String),

    /// No GitLab project id is stored for the request.
    #[error("GitLab project id not found for request {0}")]
    ProjectNotFound(i64),
}

/// Result type using the apexgen [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
