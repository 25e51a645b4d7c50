// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Replication
//!
//! Ledger → replica pipeline and its cross-check.
//!
//! - [`listener::BlockListener`] consumes block-framed chaincode events in
//!   order and checkpoints after each block.
//! - [`events`] turns one named event into one store mutation.
//! - [`validator::ConsistencyValidator`] diffs ledger state against the
//!   replica, once or on an interval.

pub mod compare;
pub mod events;
pub mod listener;
pub mod validator;

pub use events::{LedgerEvent, Mutation, TranslationError};
pub use listener::{BlockListener, ListenerError, ListenerState, ListenerStats};
pub use validator::{
    ConsistencyValidator, LoopExit, ValidationError, ValidationLoop, ValidationReport,
};
