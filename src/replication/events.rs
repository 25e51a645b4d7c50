// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chaincode event → replica mutation translation.
//!
//! | Event | Collection | Operation | Natural key |
//! |-------|------------|-----------|-------------|
//! | `CreateUser` | users | upsert | `username` |
//! | `UpdateUser` | users | update | `username` |
//! | `DeleteUser` | users (+ products, inventory) | delete | `username` |
//! | `CreateProduct` | products (+ inventory) | upsert | `id` |
//! | `UpdateProduct` | products | update | `id` |
//! | `DeleteProduct` | products (+ inventory) | delete | `id` |
//! | `NewAgreement`, `NewAgreementAnalytics` | agreements | upsert | `txID` |
//! | `UpdateAgreement` | agreements | update | `txID` |
//!
//! Translation is pure; applying the resulting [`Mutation`] is the only step
//! that touches the store.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::{Agreement, Product, User};
use crate::storage::{Collection, ReplicaStore, StoreResult, WriteOutcome};

// =============================================================================
// Event kinds
// =============================================================================

/// Chaincode events the replica understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerEvent {
    CreateUser,
    UpdateUser,
    DeleteUser,
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
    NewAgreement,
    NewAgreementAnalytics,
    UpdateAgreement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upsert,
    Update,
    Delete,
}

/// Where an event lands and what it does there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub collection: Collection,
    pub operation: Operation,
    pub key: &'static str,
}

impl LedgerEvent {
    pub const ALL: [LedgerEvent; 9] = [
        LedgerEvent::CreateUser,
        LedgerEvent::UpdateUser,
        LedgerEvent::DeleteUser,
        LedgerEvent::CreateProduct,
        LedgerEvent::UpdateProduct,
        LedgerEvent::DeleteProduct,
        LedgerEvent::NewAgreement,
        LedgerEvent::NewAgreementAnalytics,
        LedgerEvent::UpdateAgreement,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LedgerEvent::CreateUser => "CreateUser",
            LedgerEvent::UpdateUser => "UpdateUser",
            LedgerEvent::DeleteUser => "DeleteUser",
            LedgerEvent::CreateProduct => "CreateProduct",
            LedgerEvent::UpdateProduct => "UpdateProduct",
            LedgerEvent::DeleteProduct => "DeleteProduct",
            LedgerEvent::NewAgreement => "NewAgreement",
            LedgerEvent::NewAgreementAnalytics => "NewAgreementAnalytics",
            LedgerEvent::UpdateAgreement => "UpdateAgreement",
        }
    }

    pub fn route(self) -> Route {
        use Collection::*;
        use Operation::*;

        let (collection, operation) = match self {
            LedgerEvent::CreateUser => (Users, Upsert),
            LedgerEvent::UpdateUser => (Users, Update),
            LedgerEvent::DeleteUser => (Users, Delete),
            LedgerEvent::CreateProduct => (Products, Upsert),
            LedgerEvent::UpdateProduct => (Products, Update),
            LedgerEvent::DeleteProduct => (Products, Delete),
            LedgerEvent::NewAgreement | LedgerEvent::NewAgreementAnalytics => (Agreements, Upsert),
            LedgerEvent::UpdateAgreement => (Agreements, Update),
        };
        let key = match collection {
            Users => "username",
            Products => "id",
            Agreements => "txID",
            Inventory => "productID",
        };
        Route {
            collection,
            operation,
            key,
        }
    }
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ledger event: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for LedgerEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LedgerEvent::ALL
            .into_iter()
            .find(|event| event.name() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("event payload is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("{event} payload is missing natural key `{key}`")]
    MissingKey {
        event: LedgerEvent,
        key: &'static str,
    },

    #[error("{event} payload does not match the {collection} document shape: {source}")]
    Shape {
        event: LedgerEvent,
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Mutations
// =============================================================================

/// A single replica-store change derived from one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    UpsertUser(User),
    UpdateUser(User),
    DeleteUser { username: String },
    UpsertProduct(Product),
    UpdateProduct(Product),
    DeleteProduct { id: String },
    UpsertAgreement(Agreement),
    UpdateAgreement(Agreement),
}

impl Mutation {
    pub fn collection(&self) -> Collection {
        match self {
            Mutation::UpsertUser(_) | Mutation::UpdateUser(_) | Mutation::DeleteUser { .. } => {
                Collection::Users
            }
            Mutation::UpsertProduct(_)
            | Mutation::UpdateProduct(_)
            | Mutation::DeleteProduct { .. } => Collection::Products,
            Mutation::UpsertAgreement(_) | Mutation::UpdateAgreement(_) => Collection::Agreements,
        }
    }

    /// Natural key of the target document.
    pub fn key(&self) -> &str {
        match self {
            Mutation::UpsertUser(u) | Mutation::UpdateUser(u) => &u.username,
            Mutation::DeleteUser { username } => username,
            Mutation::UpsertProduct(p) | Mutation::UpdateProduct(p) => &p.id,
            Mutation::DeleteProduct { id } => id,
            Mutation::UpsertAgreement(a) | Mutation::UpdateAgreement(a) => &a.tx_id,
        }
    }

    /// Apply to the store. Every variant is idempotent by natural key.
    pub fn apply(&self, store: &ReplicaStore) -> StoreResult<WriteOutcome> {
        match self {
            Mutation::UpsertUser(user) => store.upsert_user(user),
            Mutation::UpdateUser(user) => store.update_user(user),
            Mutation::DeleteUser { username } => store.delete_user(username),
            Mutation::UpsertProduct(product) => store.upsert_product(product),
            Mutation::UpdateProduct(product) => store.update_product(product),
            Mutation::DeleteProduct { id } => store.delete_product(id),
            Mutation::UpsertAgreement(agreement) => store.upsert_agreement(agreement),
            Mutation::UpdateAgreement(agreement) => store.update_agreement(agreement),
        }
    }
}

// =============================================================================
// Translation
// =============================================================================

/// Decode a raw UTF-8 JSON event payload.
pub fn decode_payload(bytes: &[u8]) -> Result<Value, TranslationError> {
    serde_json::from_slice(bytes).map_err(TranslationError::Decode)
}

/// Translate a named event. Unknown names yield `Ok(None)`.
pub fn translate_named(name: &str, payload: Value) -> Result<Option<Mutation>, TranslationError> {
    match name.parse::<LedgerEvent>() {
        Ok(event) => translate(event, payload).map(Some),
        Err(_) => Ok(None),
    }
}

/// Translate a known event into its mutation.
pub fn translate(event: LedgerEvent, payload: Value) -> Result<Mutation, TranslationError> {
    let route = event.route();
    let key = natural_key(&payload, route.key)
        .ok_or(TranslationError::MissingKey {
            event,
            key: route.key,
        })?
        .to_string();

    let mutation = match event {
        LedgerEvent::CreateUser => Mutation::UpsertUser(shape(event, route, payload)?),
        LedgerEvent::UpdateUser => Mutation::UpdateUser(shape(event, route, payload)?),
        LedgerEvent::DeleteUser => Mutation::DeleteUser { username: key },
        LedgerEvent::CreateProduct => Mutation::UpsertProduct(shape(event, route, payload)?),
        LedgerEvent::UpdateProduct => Mutation::UpdateProduct(shape(event, route, payload)?),
        LedgerEvent::DeleteProduct => Mutation::DeleteProduct { id: key },
        LedgerEvent::NewAgreement | LedgerEvent::NewAgreementAnalytics => {
            Mutation::UpsertAgreement(shape(event, route, payload)?)
        }
        LedgerEvent::UpdateAgreement => Mutation::UpdateAgreement(shape(event, route, payload)?),
    };
    Ok(mutation)
}

fn natural_key<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn shape<T: DeserializeOwned>(
    event: LedgerEvent,
    route: Route,
    payload: Value,
) -> Result<T, TranslationError> {
    serde_json::from_value(payload).map_err(|source| TranslationError::Shape {
        event,
        collection: route.collection.name(),
        source,
    })
}
