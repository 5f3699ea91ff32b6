// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL implementation of the [`Store`] trait.
//!
//! View names come exclusively from the static catalog; request input never
//! reaches an identifier position.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::catalog::CatalogEntry;
use crate::store::{
    HISTORY_LIMIT, ResourceData, Result, SecurityGroupRule, StatusRecord, StatusUpdate, Store,
};

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    /// Fetch the security-group rules attached to a request.
    ///
    /// Faults degrade to an empty list: many resource types have no ingress
    /// view at all, and a missing view surfaces as a query error here.
    async fn fetch_sg_rules(
        &self,
        entry: &CatalogEntry,
        request_id: i64,
    ) -> Vec<SecurityGroupRule> {
        let query = format!(
            "SELECT from_port, to_port, protocol, cidr, description FROM {} WHERE request_id = $1",
            entry.sg_view
        );

        match sqlx::query_as::<_, SecurityGroupRule>(&query)
            .bind(request_id)
            .fetch_all(&self.pool)
            .await
        {
            Ok(rules) => rules,
            Err(e) => {
                warn!(
                    sg_view = entry.sg_view,
                    request_id,
                    error = %e,
                    "No security-group rules found"
                );
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn fetch_resource(
        &self,
        entry: &CatalogEntry,
        request_id: i64,
    ) -> Result<Option<ResourceData>> {
        let query = format!(
            "SELECT row_to_json(t) FROM {} t WHERE id = $1",
            entry.requests_view
        );

        let row: Option<serde_json::Value> = sqlx::query_scalar(&query)
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| {
                error!(
                    requests_view = entry.requests_view,
                    request_id,
                    error = %e,
                    "Resource lookup failed"
                );
            })?;

        let Some(serde_json::Value::Object(mut data)) = row else {
            warn!(
                cloud_id = %entry.cloud,
                resource_type = entry.resource_type,
                request_id,
                "No resource found"
            );
            return Ok(None);
        };

        let rules = self.fetch_sg_rules(entry, request_id).await;
        data.insert(
            "sg_rules".to_string(),
            serde_json::to_value(rules).unwrap_or_else(|_| serde_json::Value::Array(Vec::new())),
        );

        info!(
            cloud_id = %entry.cloud,
            resource_type = entry.resource_type,
            request_id,
            "Resource data fetched"
        );
        Ok(Some(data))
    }

    async fn fetch_template(
        &self,
        cloud_id: &str,
        resource_type: &str,
        module_version: &str,
    ) -> Result<Option<String>> {
        let template: Option<String> = sqlx::query_scalar(
            r#"
            SELECT jinja_template
            FROM tf_template
            WHERE cloud_id = $1 AND resource_type = $2 AND module_version = $3
            "#,
        )
        .bind(cloud_id)
        .bind(resource_type)
        .bind(module_version)
        .fetch_optional(&self.pool)
        .await?;

        if template.is_none() {
            warn!(cloud_id, resource_type, module_version, "Template not found");
        }
        Ok(template)
    }

    async fn fetch_gitlab_token(&self, username: &str) -> Result<Option<String>> {
        let result: std::result::Result<Option<Option<String>>, sqlx::Error> =
            sqlx::query_scalar("SELECT gitlab_token FROM users WHERE login = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await;

        // Degrade faults to None: an unreadable token and a missing token are
        // the same terminal outcome for the caller.
        match result {
            Ok(token) => Ok(token.flatten()),
            Err(e) => {
                error!(username, error = %e, "GitLab token lookup failed");
                Ok(None)
            }
        }
    }

    async fn fetch_project_id(
        &self,
        entry: &CatalogEntry,
        request_id: i64,
    ) -> Result<Option<i64>> {
        let query = format!(
            "SELECT gitlab_project_id FROM {} WHERE id = $1",
            entry.requests_view
        );

        let result: std::result::Result<Option<Option<i64>>, sqlx::Error> =
            sqlx::query_scalar(&query)
                .bind(request_id)
                .fetch_optional(&self.pool)
                .await;

        match result {
            Ok(id) => Ok(id.flatten()),
            Err(e) => {
                error!(
                    requests_view = entry.requests_view,
                    request_id,
                    error = %e,
                    "GitLab project id lookup failed"
                );
                Ok(None)
            }
        }
    }

    async fn upsert_status(&self, update: &StatusUpdate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tf_generation_status
                (apex_request_id, username, cloud_id, resource_type, status,
                 message, merge_request_url, started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5::generation_state, $6, $7, NOW(),
                    CASE WHEN $5 IN ('FAILED', 'SUCCESS') THEN NOW() END)
            ON CONFLICT (apex_request_id) DO UPDATE SET
                username = EXCLUDED.username,
                cloud_id = EXCLUDED.cloud_id,
                resource_type = EXCLUDED.resource_type,
                status = EXCLUDED.status,
                message = EXCLUDED.message,
                merge_request_url =
                    COALESCE(EXCLUDED.merge_request_url, tf_generation_status.merge_request_url),
                started_at = CASE WHEN $5 = 'STARTED'
                    THEN NOW() ELSE tf_generation_status.started_at END,
                finished_at = CASE WHEN $5 IN ('FAILED', 'SUCCESS')
                    THEN NOW() END
            "#,
        )
        .bind(update.apex_request_id)
        .bind(&update.username)
        .bind(&update.cloud_id)
        .bind(&update.resource_type)
        .bind(update.state.as_str())
        .bind(&update.message)
        .bind(&update.merge_request_url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn status_history(&self, username: &str) -> Result<Vec<StatusRecord>> {
        let records = sqlx::query_as::<_, StatusRecord>(
            r#"
            SELECT apex_request_id, username, cloud_id, resource_type,
                   status::TEXT AS status, message, merge_request_url,
                   started_at, finished_at
            FROM tf_generation_status
            WHERE username = $1
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(username)
        .bind(HISTORY_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
