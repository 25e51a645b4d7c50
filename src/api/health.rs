// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;
use crate::storage::Collection;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    pub service: String,
    /// "ok", "disconnected" or "error".
    pub replica: String,
    /// Document counts per collection, when the replica is readable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<DocumentCounts>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentCounts {
    pub users: usize,
    pub products: usize,
    pub agreements: usize,
    pub inventory: usize,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

fn document_counts(state: &AppState) -> Option<DocumentCounts> {
    let count = |c| state.store.count(c).ok();
    Some(DocumentCounts {
        users: count(Collection::Users)?,
        products: count(Collection::Products)?,
        agreements: count(Collection::Agreements)?,
        inventory: count(Collection::Inventory)?,
    })
}

/// Health check endpoint handler.
///
/// Returns 200 if the replica store is readable, 503 otherwise.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let documents = if state.store.is_connected() {
        document_counts(&state)
    } else {
        None
    };
    let replica = match (state.store.is_connected(), &documents) {
        (false, _) => "disconnected",
        (true, None) => "error",
        (true, Some(_)) => "ok",
    };
    let all_ok = replica == "ok";

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            replica: replica.to_string(),
            documents,
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
