// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Replica Storage
//!
//! Off-chain copy of chaincode state in an embedded redb database, plus the
//! listener's durable checkpoint.
//!
//! ## Storage Layout
//!
//! ```text
//! ./data/
//!   replica.redb    # users, products, agreements, inventory (+ owner index)
//!   next_block      # next block number the listener will request
//! ```
//!
//! ## Important Notes
//!
//! - The ledger is authoritative. Nothing here is ever written back to it.
//! - Inventory is derived from products and never written directly.
//! - Single-document writes are atomic; cascades are ordered sequences of
//!   them, not one transaction.

pub mod checkpoint;
pub mod query;
pub mod replica;

pub use checkpoint::{CheckpointError, CheckpointFile};
pub use query::{Filter, FindOptions, Page, Sort, SortOrder, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use replica::{Collection, ReplicaStore, StoreError, StoreResult, WriteOutcome};
