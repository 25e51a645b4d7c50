// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::ApiError,
    state::AppState,
    storage::{Collection, Filter, FindOptions, Page, Sort, SortOrder, DEFAULT_PAGE_SIZE},
};

/// A replicated document as stored.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct Document(pub Value);

/// Paging, sorting and filter parameters shared by the list endpoints.
///
/// Each endpoint only honors the filters listed in its description.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// 1-based page number (default: 1)
    pub page: Option<usize>,
    /// Documents per page (default: 10, max: 500)
    pub page_size: Option<usize>,
    /// Field to sort by, dotted paths allowed (default: "timestamp")
    pub sort_by: Option<String>,
    /// "asc" or "desc" (default: "desc")
    pub order: Option<String>,
    pub owner: Option<String>,
    pub sector: Option<String>,
    pub product_type: Option<String>,
    pub buyer: Option<String>,
    pub seller: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    pub items: Vec<Document>,
    pub page: usize,
    pub page_size: usize,
    /// Matching documents across all pages.
    pub total: usize,
}

impl From<Page<Value>> for PageResponse {
    fn from(page: Page<Value>) -> Self {
        Self {
            items: page.items.into_iter().map(Document).collect(),
            page: page.page,
            page_size: page.page_size,
            total: page.total,
        }
    }
}

impl ListQuery {
    fn find_options(&self, filters: &[(&str, Option<&String>)]) -> Result<FindOptions, ApiError> {
        let order = match self.order.as_deref() {
            None => SortOrder::Desc,
            Some(o) if o.eq_ignore_ascii_case("desc") => SortOrder::Desc,
            Some(o) if o.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            Some(other) => {
                return Err(ApiError::bad_request(format!(
                    "order must be \"asc\" or \"desc\", got \"{other}\""
                )))
            }
        };
        let sort = match &self.sort_by {
            Some(field) if !field.is_empty() => Sort {
                field: field.clone(),
                order,
            },
            _ => Sort {
                order,
                ..Sort::default()
            },
        };

        let filter = filters
            .iter()
            .fold(Filter::new(), |filter, (field, value)| match value {
                Some(v) => filter.eq(*field, v.as_str()),
                None => filter,
            });

        Ok(FindOptions::default()
            .with_filter(filter)
            .with_sort(sort)
            .with_page(
                self.page.unwrap_or(1),
                self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            ))
    }
}

fn list(state: &AppState, collection: Collection, options: FindOptions) -> Result<Json<PageResponse>, ApiError> {
    let page = state.store.find::<Value>(collection, &options)?;
    Ok(Json(page.into()))
}

fn get(state: &AppState, collection: Collection, key: &str) -> Result<Json<Document>, ApiError> {
    state
        .store
        .get_document(collection, key)?
        .map(|doc| Json(Document(doc)))
        .ok_or_else(|| ApiError::not_found(format!("{} {key} not found", collection.name())))
}

/// List replicated users.
#[utoipa::path(
    get,
    path = "/v1/users",
    tag = "Replica",
    params(ListQuery),
    responses(
        (status = 200, description = "Page of users", body = PageResponse),
        (status = 400, description = "Invalid query"),
        (status = 503, description = "Replica store unavailable")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PageResponse>, ApiError> {
    list(&state, Collection::Users, query.find_options(&[])?)
}

#[utoipa::path(
    get,
    path = "/v1/users/{username}",
    tag = "Replica",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "User document", body = Document),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Document>, ApiError> {
    get(&state, Collection::Users, &username)
}

/// List replicated products. Filters: `owner`, `sector`, `productType`.
#[utoipa::path(
    get,
    path = "/v1/products",
    tag = "Replica",
    params(ListQuery),
    responses(
        (status = 200, description = "Page of products", body = PageResponse),
        (status = 400, description = "Invalid query"),
        (status = 503, description = "Replica store unavailable")
    )
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PageResponse>, ApiError> {
    let options = query.find_options(&[
        ("owner", query.owner.as_ref()),
        ("sector", query.sector.as_ref()),
        ("productType", query.product_type.as_ref()),
    ])?;
    list(&state, Collection::Products, options)
}

#[utoipa::path(
    get,
    path = "/v1/products/{id}",
    tag = "Replica",
    params(("id" = String, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product document", body = Document),
        (status = 404, description = "Product not found")
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    get(&state, Collection::Products, &id)
}

/// List replicated agreements. Filters: `buyer`, `seller`, `status`.
#[utoipa::path(
    get,
    path = "/v1/agreements",
    tag = "Replica",
    params(ListQuery),
    responses(
        (status = 200, description = "Page of agreements", body = PageResponse),
        (status = 400, description = "Invalid query"),
        (status = 503, description = "Replica store unavailable")
    )
)]
pub async fn list_agreements(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PageResponse>, ApiError> {
    let options = query.find_options(&[
        ("buyer", query.buyer.as_ref()),
        ("seller", query.seller.as_ref()),
        ("status", query.status.as_ref()),
    ])?;
    list(&state, Collection::Agreements, options)
}

#[utoipa::path(
    get,
    path = "/v1/agreements/{tx_id}",
    tag = "Replica",
    params(("tx_id" = String, Path, description = "Agreement transaction ID")),
    responses(
        (status = 200, description = "Agreement document", body = Document),
        (status = 404, description = "Agreement not found")
    )
)]
pub async fn get_agreement(
    State(state): State<AppState>,
    Path(tx_id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    get(&state, Collection::Agreements, &tx_id)
}

/// List inventory entries. Filter: `owner`.
#[utoipa::path(
    get,
    path = "/v1/inventory",
    tag = "Replica",
    params(ListQuery),
    responses(
        (status = 200, description = "Page of inventory entries", body = PageResponse),
        (status = 400, description = "Invalid query"),
        (status = 503, description = "Replica store unavailable")
    )
)]
pub async fn list_inventory(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PageResponse>, ApiError> {
    let options = query.find_options(&[("owner", query.owner.as_ref())])?;
    list(&state, Collection::Inventory, options)
}
