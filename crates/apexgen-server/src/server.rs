// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP server for the generation API.
//!
//! Three routes: the generation trigger, per-user status history, and a
//! health probe. The API routes sit behind an optional shared-secret check on
//! the `x-api-key` header; `/health` is always open.

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::gitlab::GitLabError;
use crate::handlers::{self, AppState, GenerateRequest, GenerateResponse};
use crate::store::StatusRecord;

/// Header carrying the shared API secret.
const API_KEY_HEADER: &str = "x-api-key";

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/generate", post(generate))
        .route("/status/{username}", get(history))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(addr: std::net::SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
}

// ============================================================================
// Route handlers
// ============================================================================

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> std::result::Result<Json<GenerateResponse>, ApiError> {
    handlers::handle_generate(&state, request)
        .await
        .map(Json)
        .map_err(ApiError)
}

async fn history(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> std::result::Result<Json<Vec<StatusRecord>>, ApiError> {
    handlers::handle_history(&state, &username)
        .await
        .map(Json)
        .map_err(ApiError)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(handlers::handle_health(&state))
}

/// Reject API requests without the configured shared secret.
async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &state.api_key {
        let presented = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        if presented != Some(expected.as_str()) {
            warn!(path = %request.uri().path(), "Request rejected: missing or invalid API key");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Missing or invalid API key" })),
            )
                .into_response();
        }
    }
    next.run(request).await
}

// ============================================================================
// Error mapping
// ============================================================================

/// Transport-level wrapper mapping pipeline errors onto HTTP responses.
///
/// Absent rows map to 404, rejected input or artifacts to 400, upstream
/// faults to a generic 500 with the detail kept in the logs.
pub struct ApiError(
    /// Underlying pipeline error.
    pub Error,
);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            Error::ResourceNotFound { .. }
            | Error::TemplateNotFound { .. }
            | Error::TokenNotFound(_)
            | Error::ProjectNotFound(_) => (
                StatusCode::NOT_FOUND,
                json!({ "error": self.0.to_string() }),
            ),

            Error::MissingModuleVersion(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": self.0.to_string() }),
            ),

            Error::InvalidArtifact { errors, rendered } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": self.0.to_string(),
                    "details": errors,
                    "terraform_code": rendered,
                }),
            ),

            Error::Render(e) => {
                error!(error = %e, "Template rendering failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": self.0.to_string() }),
                )
            }

            // Upstream faults: full context in the logs, generic body out.
            Error::Store(e) => {
                error!(error = %e, "Store fault during generation");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Terraform generation failed" }),
                )
            }
            Error::GitLab(e) => {
                error!(error = %e, "GitLab fault during publication");
                let body = match e {
                    GitLabError::ProjectNotFound(_) => json!({ "error": e.to_string() }),
                    _ => json!({ "error": "Terraform generation failed" }),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
            Error::Config(e) => {
                error!(error = %e, "Configuration fault surfaced in a handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Terraform generation failed" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}
