// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for apexgen-server integration tests.
//!
//! Provides an in-memory [`Store`] implementation with the same upsert
//! semantics as the PostgreSQL ledger, plus helpers for wiring a GitLab mock
//! server into handler state.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use apexgen_server::catalog::CatalogEntry;
use apexgen_server::store::{
    GenerationState, ResourceData, Result, SecurityGroupRule, StatusRecord, StatusUpdate, Store,
    StoreError,
};

/// In-memory store with seedable rows and a ledger keyed by apex request id.
#[derive(Default)]
pub struct MockStore {
    resources: Mutex<HashMap<(String, i64), ResourceData>>,
    templates: Mutex<HashMap<(String, String, String), String>>,
    tokens: Mutex<HashMap<String, String>>,
    project_ids: Mutex<HashMap<i64, i64>>,
    ledger: Mutex<BTreeMap<i64, StatusRecord>>,
    resource_fetches: AtomicUsize,
    fail_resource_fetch: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose primary resource lookup raises an upstream fault.
    pub fn with_unreachable_resources() -> Self {
        Self {
            fail_resource_fetch: true,
            ..Self::default()
        }
    }

    pub fn seed_resource(&self, cloud_id: &str, resource_type: &str, request_id: i64, row: serde_json::Value) {
        let serde_json::Value::Object(data) = row else {
            panic!("resource rows must be JSON objects");
        };
        self.resources.lock().unwrap().insert(
            (format!("v_{cloud_id}_{resource_type}_requests"), request_id),
            data,
        );
    }

    pub fn seed_template(&self, cloud_id: &str, resource_type: &str, module_version: &str, text: &str) {
        self.templates.lock().unwrap().insert(
            (
                cloud_id.to_string(),
                resource_type.to_string(),
                module_version.to_string(),
            ),
            text.to_string(),
        );
    }

    pub fn seed_token(&self, username: &str, token: &str) {
        self.tokens
            .lock()
            .unwrap()
            .insert(username.to_string(), token.to_string());
    }

    pub fn seed_project_id(&self, request_id: i64, project_id: i64) {
        self.project_ids
            .lock()
            .unwrap()
            .insert(request_id, project_id);
    }

    /// How many times the primary resource lookup reached the store.
    pub fn resource_fetch_count(&self) -> usize {
        self.resource_fetches.load(Ordering::SeqCst)
    }

    /// Every ledger row, keyed by apex request id.
    pub fn ledger_rows(&self) -> Vec<StatusRecord> {
        self.ledger.lock().unwrap().values().cloned().collect()
    }

    /// The single ledger row for a request id, if present.
    pub fn ledger_row(&self, request_id: i64) -> Option<StatusRecord> {
        self.ledger.lock().unwrap().get(&request_id).cloned()
    }
}

#[async_trait]
impl Store for MockStore {
    async fn fetch_resource(
        &self,
        entry: &CatalogEntry,
        request_id: i64,
    ) -> Result<Option<ResourceData>> {
        self.resource_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_resource_fetch {
            return Err(StoreError::Other("store unreachable".to_string()));
        }
        Ok(self
            .resources
            .lock()
            .unwrap()
            .get(&(entry.requests_view.to_string(), request_id))
            .cloned())
    }

    async fn fetch_template(
        &self,
        cloud_id: &str,
        resource_type: &str,
        module_version: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .templates
            .lock()
            .unwrap()
            .get(&(
                cloud_id.to_string(),
                resource_type.to_string(),
                module_version.to_string(),
            ))
            .cloned())
    }

    async fn fetch_gitlab_token(&self, username: &str) -> Result<Option<String>> {
        Ok(self.tokens.lock().unwrap().get(username).cloned())
    }

    async fn fetch_project_id(
        &self,
        _entry: &CatalogEntry,
        request_id: i64,
    ) -> Result<Option<i64>> {
        Ok(self.project_ids.lock().unwrap().get(&request_id).copied())
    }

    async fn upsert_status(&self, update: &StatusUpdate) -> Result<()> {
        let mut ledger = self.ledger.lock().unwrap();
        let now = Utc::now();
        let terminal = matches!(
            update.state,
            GenerationState::Failed | GenerationState::Success
        );

        match ledger.get_mut(&update.apex_request_id) {
            Some(row) => {
                row.username = update.username.clone();
                row.cloud_id = update.cloud_id.clone();
                row.resource_type = update.resource_type.clone();
                row.status = update.state.as_str().to_string();
                row.message = update.message.clone();
                if update.merge_request_url.is_some() {
                    row.merge_request_url = update.merge_request_url.clone();
                }
                if update.state == GenerationState::Started {
                    row.started_at = now;
                }
                row.finished_at = terminal.then_some(now);
            }
            None => {
                ledger.insert(
                    update.apex_request_id,
                    StatusRecord {
                        apex_request_id: update.apex_request_id,
                        username: update.username.clone(),
                        cloud_id: update.cloud_id.clone(),
                        resource_type: update.resource_type.clone(),
                        status: update.state.as_str().to_string(),
                        message: update.message.clone(),
                        merge_request_url: update.merge_request_url.clone(),
                        started_at: now,
                        finished_at: terminal.then_some(now),
                    },
                );
            }
        }
        Ok(())
    }

    async fn status_history(&self, username: &str) -> Result<Vec<StatusRecord>> {
        let mut records: Vec<StatusRecord> = self
            .ledger
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.username == username)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records.truncate(20);
        Ok(records)
    }
}

/// A security-group rule row for seeding test resources.
pub fn sg_rule(from_port: i32, to_port: i32, cidr: &str) -> SecurityGroupRule {
    SecurityGroupRule {
        from_port,
        to_port,
        protocol: "tcp".to_string(),
        cidr: cidr.to_string(),
        description: None,
    }
}
