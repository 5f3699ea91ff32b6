// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Generation pipeline handlers.
//!
//! `handle_generate` runs the gate sequence for one attempt: resource lookup,
//! template resolution, rendering, validation, credential and routing lookup,
//! publication. Every gate short-circuits with its own error; the ledger sees
//! STARTED before the first lookup and exactly one terminal write per
//! attempt, on every path.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog;
use crate::error::{Error, Result};
use crate::gitlab::{DEFAULT_TARGET_BRANCH, GitLabClient, MergeRequest};
use crate::render::Renderer;
use crate::store::{GenerationState, ResourceData, StatusRecord, StatusUpdate, Store};
use crate::template_cache::TemplateCache;
use crate::validate::validate;

/// Shared state for request handlers.
pub struct AppState {
    /// Relational store (resource views, templates, tokens, ledger).
    pub store: Arc<dyn Store>,
    /// Process-wide template cache.
    pub templates: TemplateCache,
    /// Template renderer.
    pub renderer: Renderer,
    /// GitLab publication client.
    pub gitlab: GitLabClient,
    /// Shared secret for the `x-api-key` gate; `None` disables it.
    pub api_key: Option<String>,
    /// Server version string.
    pub version: String,
}

impl AppState {
    /// Create handler state over an existing store and GitLab client.
    pub fn new(store: Arc<dyn Store>, gitlab: GitLabClient, api_key: Option<String>) -> Self {
        Self {
            store,
            templates: TemplateCache::new(),
            renderer: Renderer::new(),
            gitlab,
            api_key,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Body of a generation trigger.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    /// User the attempt runs as; their GitLab token is used for publication.
    pub username: String,
    /// Cloud identifier (aws, gcp, azure).
    pub cloud_id: String,
    /// Resource type (rds, ec2, ...).
    pub resource_type: String,
    /// Apex request id of the stored resource request.
    pub request_id: i64,
}

/// Successful generation response.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    /// Always `true` in a 200 response.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// The created merge request.
    pub merge_request: MergeRequest,
}

/// Health endpoint response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Fixed "healthy" marker.
    pub status: &'static str,
    /// Server version.
    pub version: String,
}

// ============================================================================
// Generation
// ============================================================================

/// Run one generation attempt end to end.
///
/// Journals STARTED before any lookup, then exactly one terminal state for
/// whichever way the gate sequence ends.
pub async fn handle_generate(
    state: &AppState,
    request: GenerateRequest,
) -> Result<GenerateResponse> {
    let correlation = short_correlation_id();
    info!(
        correlation = %correlation,
        username = %request.username,
        cloud_id = %request.cloud_id,
        resource_type = %request.resource_type,
        request_id = request.request_id,
        "Terraform generation request received"
    );

    record_status(
        state.store.as_ref(),
        status_update(&request, GenerationState::Started, "Generation started", None),
    )
    .await;

    let outcome = run_generation(state, &request).await;

    match &outcome {
        Ok(response) => {
            record_status(
                state.store.as_ref(),
                status_update(
                    &request,
                    GenerationState::Success,
                    &response.message,
                    Some(response.merge_request.url.clone()),
                ),
            )
            .await;
            info!(
                correlation = %correlation,
                request_id = request.request_id,
                merge_request_url = %response.merge_request.url,
                "Generation succeeded"
            );
        }
        Err(e) => {
            record_status(
                state.store.as_ref(),
                status_update(&request, GenerationState::Failed, &e.to_string(), None),
            )
            .await;
            error!(
                correlation = %correlation,
                request_id = request.request_id,
                error = %e,
                "Generation failed"
            );
        }
    }

    outcome
}

/// The gate sequence proper. Terminal status recording happens in the caller.
async fn run_generation(state: &AppState, request: &GenerateRequest) -> Result<GenerateResponse> {
    let resource_not_found = || Error::ResourceNotFound {
        cloud_id: request.cloud_id.clone(),
        resource_type: request.resource_type.clone(),
        request_id: request.request_id,
    };

    // Gate 1: the pair must be in the catalog and the row must exist. An
    // uncataloged pair fails closed here, before any store contact.
    let Some(entry) = catalog::lookup(&request.cloud_id, &request.resource_type) else {
        warn!(
            cloud_id = %request.cloud_id,
            resource_type = %request.resource_type,
            "Pair outside the supported catalog"
        );
        return Err(resource_not_found());
    };

    let resource = state
        .store
        .fetch_resource(entry, request.request_id)
        .await?
        .ok_or_else(resource_not_found)?;

    // Gate 2: the row must say which module version to render for.
    let module_version = attribute_text(&resource, "module_version")
        .ok_or(Error::MissingModuleVersion(request.request_id))?;

    // Gate 3: a template must exist for the triple.
    let template = state
        .templates
        .get(
            state.store.as_ref(),
            &request.cloud_id,
            &request.resource_type,
            &module_version,
        )
        .await
        .ok_or_else(|| Error::TemplateNotFound {
            cloud_id: request.cloud_id.clone(),
            resource_type: request.resource_type.clone(),
            module_version: module_version.clone(),
        })?;

    // Gates 4 and 5: render, then structurally validate the artifact.
    let rendered = state.renderer.render(&template, &resource)?;

    let validation = validate(&rendered);
    if !validation.is_valid {
        return Err(Error::InvalidArtifact {
            errors: validation.errors,
            rendered,
        });
    }

    // Gates 6 and 7: publication credentials and routing.
    let token = state
        .store
        .fetch_gitlab_token(&request.username)
        .await?
        .ok_or_else(|| Error::TokenNotFound(request.username.clone()))?;

    let project_id = state
        .store
        .fetch_project_id(entry, request.request_id)
        .await?
        .ok_or(Error::ProjectNotFound(request.request_id))?;

    // Gate 8: publish. Branch and path are deterministic per request so a
    // retried attempt replaces its own leftovers instead of colliding.
    let name = attribute_text(&resource, "name")
        .unwrap_or_else(|| format!("resource-{}", request.request_id));
    let source_branch = format!(
        "feature/{}-{}-{}",
        request.cloud_id, request.resource_type, name
    );
    let file_path = format!("{}/{}/{}.tf", request.cloud_id, request.resource_type, name);
    let files = BTreeMap::from([(file_path, rendered)]);

    let title = format!(
        "Add {} {}: {}",
        request.cloud_id, request.resource_type, name
    );
    let description = format!(
        "Automatically generated Terraform resource\n\n\
         Cloud: {}\n\
         Type: {}\n\
         Module version: {}\n\
         Request id: {}",
        request.cloud_id, request.resource_type, module_version, request.request_id
    );

    let merge_request = state
        .gitlab
        .create_merge_request(
            &token,
            project_id,
            &files,
            &source_branch,
            DEFAULT_TARGET_BRANCH,
            &title,
            &description,
        )
        .await?;

    Ok(GenerateResponse {
        success: true,
        message: "Terraform configuration generated and merge request created".to_string(),
        merge_request,
    })
}

// ============================================================================
// History and health
// ============================================================================

/// Ledger rows for a user, newest first.
pub async fn handle_history(state: &AppState, username: &str) -> Result<Vec<StatusRecord>> {
    let records = state.store.status_history(username).await?;
    info!(username, count = records.len(), "Status history fetched");
    Ok(records)
}

/// Service liveness and version.
pub fn handle_health(state: &AppState) -> HealthResponse {
    HealthResponse {
        status: "healthy",
        version: state.version.clone(),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Resource attribute as text. Strings pass through, numbers are formatted;
/// anything else (including null) counts as absent.
fn attribute_text(resource: &ResourceData, key: &str) -> Option<String> {
    match resource.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Write to the ledger without letting a ledger fault fail the attempt.
///
/// Ledger writes are telemetry: a broken status table is logged and the main
/// flow continues.
async fn record_status(store: &dyn Store, update: StatusUpdate) {
    if let Err(e) = store.upsert_status(&update).await {
        warn!(
            apex_request_id = update.apex_request_id,
            state = %update.state,
            error = %e,
            "Status ledger write failed"
        );
    }
}

fn status_update(
    request: &GenerateRequest,
    state: GenerationState,
    message: &str,
    merge_request_url: Option<String>,
) -> StatusUpdate {
    StatusUpdate {
        apex_request_id: request.request_id,
        username: request.username.clone(),
        cloud_id: request.cloud_id.clone(),
        resource_type: request.resource_type.clone(),
        state,
        message: message.to_string(),
        merge_request_url,
    }
}

/// Short id binding one request's log lines together.
fn short_correlation_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}
