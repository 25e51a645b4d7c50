// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! fabric-replica - Off-chain replica for a Hyperledger Fabric marketplace
//!
//! Mirrors chaincode events into an embedded document store, checks the
//! replica against ledger state, and submits transactions signed outside
//! this process.
//!
//! ## Modules
//!
//! - `replication` - block listener, event translation, consistency validator
//! - `storage` - replica store (redb), queries, listener checkpoint
//! - `ledger` - gateway seams, REST gateway adapter, contracts, identities
//! - `signing` - offline proposal / transaction / commit signing
//! - `api` - read-only HTTP query API (Axum)
//! - `cli` - command-line entry points

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod replication;
pub mod signing;
pub mod state;
pub mod storage;
pub mod telemetry;
