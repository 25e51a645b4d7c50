// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only HTTP surface over the replica store.

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{error::ErrorBody, state::AppState};

pub mod health;
pub mod replica;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/users", get(replica::list_users))
        .route("/users/{username}", get(replica::get_user))
        .route("/products", get(replica::list_products))
        .route("/products/{id}", get(replica::get_product))
        .route("/agreements", get(replica::list_agreements))
        .route("/agreements/{tx_id}", get(replica::get_agreement))
        .route("/inventory", get(replica::list_inventory));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        replica::list_users,
        replica::get_user,
        replica::list_products,
        replica::get_product,
        replica::list_agreements,
        replica::get_agreement,
        replica::list_inventory
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::DocumentCounts,
            health::HealthResponse,
            replica::Document,
            replica::PageResponse,
            ErrorBody
        )
    ),
    tags(
        (name = "Health", description = "Liveness and replica status"),
        (name = "Replica", description = "Queries over replicated ledger state")
    )
)]
pub struct ApiDoc;
