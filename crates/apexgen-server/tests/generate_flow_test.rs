// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for the generation gate sequence.
//!
//! Runs `handle_generate` against the in-memory store and a wiremock GitLab,
//! checking each gate's failure mode and the ledger writes around them.

mod common;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use apexgen_server::Error;
use apexgen_server::gitlab::GitLabClient;
use apexgen_server::handlers::{AppState, GenerateRequest, handle_generate, handle_history};

use common::MockStore;

const MR_URL: &str = "https://gitlab.example.com/infra/terraform/-/merge_requests/123";

/// Mount the full happy-path GitLab surface for one project.
async fn mount_gitlab(server: &MockServer, project_id: i64) {
    Mock::given(method("GET"))
        .and(path(format!("/projects/{project_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": project_id})))
        .mount(server)
        .await;

    // No leftover branch from an earlier attempt.
    Mock::given(method("DELETE"))
        .and(path_regex(format!(
            "^/projects/{project_id}/repository/branches/.+$"
        )))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/projects/{project_id}/repository/branches")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": "branch"})))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(format!(
            "^/projects/{project_id}/repository/files/.+$"
        )))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"file_path": "f"})))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("/projects/{project_id}/merge_requests")))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": 123, "web_url": MR_URL})),
        )
        .mount(server)
        .await;
}

fn request(request_id: i64) -> GenerateRequest {
    GenerateRequest {
        username: "jdoe".to_string(),
        cloud_id: "aws".to_string(),
        resource_type: "rds".to_string(),
        request_id,
    }
}

/// Store seeded so every gate passes for request 42 / project 7.
fn seeded_store() -> MockStore {
    let store = MockStore::new();
    store.seed_resource(
        "aws",
        "rds",
        42,
        json!({"id": 42, "name": "db1", "module_version": "1.0", "sg_rules": []}),
    );
    store.seed_template(
        "aws",
        "rds",
        "1.0",
        "resource \"aws_db_instance\" \"{{ name }}\" {}",
    );
    store.seed_token("jdoe", "glpat-test");
    store.seed_project_id(42, 7);
    store
}

fn state_with(store: Arc<MockStore>, gitlab_url: &str) -> AppState {
    AppState::new(store, GitLabClient::new(gitlab_url), None)
}

#[tokio::test]
async fn full_pipeline_creates_a_merge_request() {
    let gitlab = MockServer::start().await;
    mount_gitlab(&gitlab, 7).await;

    let store = Arc::new(seeded_store());
    let state = state_with(store.clone(), &gitlab.uri());

    let response = handle_generate(&state, request(42))
        .await
        .expect("generation should succeed");

    assert!(response.success);
    assert_eq!(response.merge_request.id, 123);
    assert_eq!(response.merge_request.url, MR_URL);
    assert_eq!(response.merge_request.source_branch, "feature/aws-rds-db1");
    assert_eq!(response.merge_request.target_branch, "main");

    let row = store.ledger_row(42).expect("ledger row should exist");
    assert_eq!(row.status, "SUCCESS");
    assert_eq!(row.merge_request_url.as_deref(), Some(MR_URL));
    assert!(row.finished_at.is_some());
    assert_eq!(store.ledger_rows().len(), 1);
}

#[tokio::test]
async fn unknown_cloud_fails_closed_without_touching_the_store() {
    let gitlab = MockServer::start().await;
    let store = Arc::new(seeded_store());
    let state = state_with(store.clone(), &gitlab.uri());

    let mut bad = request(42);
    bad.cloud_id = "oracle".to_string();

    let error = handle_generate(&state, bad).await.unwrap_err();
    assert!(matches!(error, Error::ResourceNotFound { .. }));
    assert_eq!(store.resource_fetch_count(), 0);

    let row = store.ledger_row(42).expect("ledger row should exist");
    assert_eq!(row.status, "FAILED");
}

#[tokio::test]
async fn missing_resource_is_not_found() {
    let gitlab = MockServer::start().await;
    let store = Arc::new(seeded_store());
    let state = state_with(store.clone(), &gitlab.uri());

    let error = handle_generate(&state, request(999)).await.unwrap_err();
    assert!(matches!(error, Error::ResourceNotFound { .. }));
    assert_eq!(store.ledger_row(999).unwrap().status, "FAILED");
}

#[tokio::test]
async fn missing_module_version_is_rejected() {
    let gitlab = MockServer::start().await;
    let store = Arc::new(MockStore::new());
    store.seed_resource("aws", "rds", 42, json!({"id": 42, "name": "db1"}));
    let state = state_with(store.clone(), &gitlab.uri());

    let error = handle_generate(&state, request(42)).await.unwrap_err();
    assert!(matches!(error, Error::MissingModuleVersion(42)));
}

#[tokio::test]
async fn missing_template_is_not_found() {
    let gitlab = MockServer::start().await;
    let store = Arc::new(MockStore::new());
    store.seed_resource(
        "aws",
        "rds",
        42,
        json!({"id": 42, "name": "db1", "module_version": "9.9"}),
    );
    let state = state_with(store.clone(), &gitlab.uri());

    let error = handle_generate(&state, request(42)).await.unwrap_err();
    assert!(matches!(error, Error::TemplateNotFound { .. }));
    assert!(error.to_string().contains("Template not found"));

    let row = store.ledger_row(42).unwrap();
    assert_eq!(row.status, "FAILED");
    assert!(row.message.contains("Template not found"));
}

#[tokio::test]
async fn invalid_artifact_reports_both_checks() {
    let gitlab = MockServer::start().await;
    let store = Arc::new(seeded_store());
    store.seed_template("aws", "rds", "1.0", "just text for {{ name }}");
    let state = state_with(store.clone(), &gitlab.uri());

    let error = handle_generate(&state, request(42)).await.unwrap_err();
    let Error::InvalidArtifact { errors, rendered } = error else {
        panic!("expected InvalidArtifact, got {error}");
    };
    assert_eq!(errors.len(), 2);
    assert_eq!(rendered, "just text for db1");
    assert_eq!(store.ledger_row(42).unwrap().status, "FAILED");
}

#[tokio::test]
async fn rendering_error_propagates() {
    let gitlab = MockServer::start().await;
    let store = Arc::new(seeded_store());
    store.seed_template("aws", "rds", "1.0", "resource \"x\" \"{{ nonexistent }}\" {}");
    let state = state_with(store.clone(), &gitlab.uri());

    let error = handle_generate(&state, request(42)).await.unwrap_err();
    assert!(matches!(error, Error::Render(_)));
    assert_eq!(store.ledger_row(42).unwrap().status, "FAILED");
}

#[tokio::test]
async fn missing_token_is_not_found() {
    let gitlab = MockServer::start().await;
    let store = Arc::new(seeded_store());
    let state = state_with(store.clone(), &gitlab.uri());

    let mut other_user = request(42);
    other_user.username = "nobody".to_string();

    let error = handle_generate(&state, other_user).await.unwrap_err();
    assert!(matches!(error, Error::TokenNotFound(_)));
}

#[tokio::test]
async fn missing_project_id_is_not_found() {
    let gitlab = MockServer::start().await;
    let store = Arc::new(MockStore::new());
    store.seed_resource(
        "aws",
        "rds",
        42,
        json!({"id": 42, "name": "db1", "module_version": "1.0"}),
    );
    store.seed_template("aws", "rds", "1.0", "resource \"x\" \"{{ name }}\" {}");
    store.seed_token("jdoe", "glpat-test");
    let state = state_with(store.clone(), &gitlab.uri());

    let error = handle_generate(&state, request(42)).await.unwrap_err();
    assert!(matches!(error, Error::ProjectNotFound(42)));
}

#[tokio::test]
async fn publish_fault_propagates_and_fails_the_attempt() {
    let gitlab = MockServer::start().await;
    // Project resolution works, branch creation blows up.
    Mock::given(method("GET"))
        .and(path("/projects/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .mount(&gitlab)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex("^/projects/7/repository/branches/.+$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&gitlab)
        .await;
    Mock::given(method("POST"))
        .and(path("/projects/7/repository/branches"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&gitlab)
        .await;

    let store = Arc::new(seeded_store());
    let state = state_with(store.clone(), &gitlab.uri());

    let error = handle_generate(&state, request(42)).await.unwrap_err();
    assert!(matches!(error, Error::GitLab(_)));
    assert_eq!(store.ledger_row(42).unwrap().status, "FAILED");
}

#[tokio::test]
async fn store_fault_fails_the_attempt_with_a_traceable_ledger_row() {
    let gitlab = MockServer::start().await;
    let store = Arc::new(MockStore::with_unreachable_resources());
    let state = state_with(store.clone(), &gitlab.uri());

    let error = handle_generate(&state, request(42)).await.unwrap_err();
    assert!(matches!(error, Error::Store(_)));

    // STARTED was journaled before the lookup, then overwritten by FAILED.
    let row = store.ledger_row(42).expect("attempt should be traceable");
    assert_eq!(row.status, "FAILED");
}

#[tokio::test]
async fn retried_request_reuses_its_ledger_row() {
    let gitlab = MockServer::start().await;
    mount_gitlab(&gitlab, 7).await;

    let store = Arc::new(MockStore::new());
    store.seed_resource(
        "aws",
        "rds",
        42,
        json!({"id": 42, "name": "db1", "module_version": "1.0"}),
    );
    store.seed_token("jdoe", "glpat-test");
    store.seed_project_id(42, 7);
    let state = state_with(store.clone(), &gitlab.uri());

    // First attempt: no template yet.
    let error = handle_generate(&state, request(42)).await.unwrap_err();
    assert!(matches!(error, Error::TemplateNotFound { .. }));
    assert_eq!(store.ledger_row(42).unwrap().status, "FAILED");

    // Operator uploads the template; the retry overwrites the same row.
    store.seed_template("aws", "rds", "1.0", "resource \"x\" \"{{ name }}\" {}");
    handle_generate(&state, request(42))
        .await
        .expect("retry should succeed");

    let rows = store.ledger_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "SUCCESS");
    assert_eq!(rows[0].merge_request_url.as_deref(), Some(MR_URL));
}

#[tokio::test]
async fn history_returns_the_users_rows() {
    let gitlab = MockServer::start().await;
    let store = Arc::new(seeded_store());
    let state = state_with(store.clone(), &gitlab.uri());

    // One failed attempt for jdoe, nothing for anyone else.
    let _ = handle_generate(&state, request(999)).await;

    let records = handle_history(&state, "jdoe").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].apex_request_id, 999);

    let empty = handle_history(&state, "other").await.unwrap();
    assert!(empty.is_empty());
}
