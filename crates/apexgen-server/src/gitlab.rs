// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! GitLab REST client for publishing generated configurations.
//!
//! Publication is a fixed call sequence against the v4 API: resolve the
//! project, drop a leftover source branch from an earlier attempt, create the
//! branch, commit each file, open the merge request. Every step is a distinct
//! failure point and any fault aborts the remaining steps. Nothing is rolled
//! back on failure; a re-triggered generation reuses the same branch name and
//! the delete step reclaims whatever the failed attempt left behind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::info;

/// Branch merge requests target unless the caller overrides it.
pub const DEFAULT_TARGET_BRANCH: &str = "main";

/// Errors from GitLab operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GitLabError {
    /// HTTP transport failed before a response arrived.
    #[error("GitLab request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The project id resolved to nothing.
    #[error("GitLab project {0} not found")]
    ProjectNotFound(i64),

    /// The API answered with an unexpected status.
    #[error("GitLab {operation} returned {status}: {body}")]
    Api {
        /// Which call in the publication sequence failed.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, for operator debugging.
        body: String,
    },
}

/// Result type for GitLab operations.
pub type Result<T> = std::result::Result<T, GitLabError>;

/// Created merge request, as returned to the API caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Merge request id.
    pub id: i64,
    /// Web URL of the merge request.
    pub url: String,
    /// Branch the files were committed to.
    pub source_branch: String,
    /// Branch the merge request targets.
    pub target_branch: String,
}

#[derive(Debug, Deserialize)]
struct MergeRequestPayload {
    id: i64,
    web_url: String,
}

/// Client for the GitLab v4 REST API.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    base_url: String,
    http: reqwest::Client,
}

impl GitLabClient {
    /// Create a client against a GitLab API base URL (`.../api/v4`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Publish files on a fresh branch and open a merge request.
    ///
    /// `files` maps repository paths to file content; each entry becomes one
    /// commit on `source_branch`.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_merge_request(
        &self,
        token: &str,
        project_id: i64,
        files: &BTreeMap<String, String>,
        source_branch: &str,
        target_branch: &str,
        title: &str,
        description: &str,
    ) -> Result<MergeRequest> {
        self.resolve_project(token, project_id).await?;
        self.delete_branch_if_exists(token, project_id, source_branch)
            .await?;
        self.create_branch(token, project_id, source_branch, target_branch)
            .await?;

        for (path, content) in files {
            self.create_file(token, project_id, source_branch, path, content)
                .await?;
        }

        self.open_merge_request(token, project_id, source_branch, target_branch, title, description)
            .await
    }

    async fn resolve_project(&self, token: &str, project_id: i64) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/projects/{}", self.base_url, project_id))
            .header("PRIVATE-TOKEN", token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GitLabError::ProjectNotFound(project_id));
        }
        expect_success(response, "project lookup").await?;
        info!(project_id, "GitLab project resolved");
        Ok(())
    }

    /// Delete the source branch left by a previous attempt, if any.
    ///
    /// A 404 means there is nothing to delete and is not a failure.
    async fn delete_branch_if_exists(
        &self,
        token: &str,
        project_id: i64,
        branch: &str,
    ) -> Result<()> {
        let response = self
            .http
            .delete(format!(
                "{}/projects/{}/repository/branches/{}",
                self.base_url,
                project_id,
                urlencoding::encode(branch)
            ))
            .header("PRIVATE-TOKEN", token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        expect_success(response, "branch delete").await?;
        info!(project_id, branch, "Existing branch deleted");
        Ok(())
    }

    async fn create_branch(
        &self,
        token: &str,
        project_id: i64,
        branch: &str,
        base: &str,
    ) -> Result<()> {
        let response = self
            .http
            .post(format!(
                "{}/projects/{}/repository/branches",
                self.base_url, project_id
            ))
            .header("PRIVATE-TOKEN", token)
            .json(&json!({ "branch": branch, "ref": base }))
            .send()
            .await?;

        expect_success(response, "branch create").await?;
        info!(project_id, branch, base, "Branch created");
        Ok(())
    }

    async fn create_file(
        &self,
        token: &str,
        project_id: i64,
        branch: &str,
        path: &str,
        content: &str,
    ) -> Result<()> {
        let response = self
            .http
            .post(format!(
                "{}/projects/{}/repository/files/{}",
                self.base_url,
                project_id,
                urlencoding::encode(path)
            ))
            .header("PRIVATE-TOKEN", token)
            .json(&json!({
                "branch": branch,
                "content": content,
                "commit_message": format!("Add {path}"),
            }))
            .send()
            .await?;

        expect_success(response, "file create").await?;
        info!(project_id, branch, path, "File committed");
        Ok(())
    }

    async fn open_merge_request(
        &self,
        token: &str,
        project_id: i64,
        source_branch: &str,
        target_branch: &str,
        title: &str,
        description: &str,
    ) -> Result<MergeRequest> {
        let response = self
            .http
            .post(format!("{}/projects/{}/merge_requests", self.base_url, project_id))
            .header("PRIVATE-TOKEN", token)
            .json(&json!({
                "source_branch": source_branch,
                "target_branch": target_branch,
                "title": title,
                "description": description,
            }))
            .send()
            .await?;

        let response = expect_success(response, "merge request create").await?;
        let payload: MergeRequestPayload = response.json().await?;

        info!(
            project_id,
            merge_request_id = payload.id,
            merge_request_url = %payload.web_url,
            "Merge request created"
        );

        Ok(MergeRequest {
            id: payload.id,
            url: payload.web_url,
            source_branch: source_branch.to_string(),
            target_branch: target_branch.to_string(),
        })
    }
}

/// Map a non-2xx response to an [`GitLabError::Api`] with its body attached.
async fn expect_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GitLabError::Api {
        operation,
        status: status.as_u16(),
        body,
    })
}
