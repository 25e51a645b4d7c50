// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Integration
//!
//! Everything that talks to the Fabric network.
//!
//! - `gateway` - session seams, call deadlines, event stream types
//! - `contracts` - chaincode function names and query wrappers
//! - `rest` - gateway adapter over the Fabric REST gateway sidecar
//! - `identity` - file-wallet identities (certificate only)

pub mod contracts;
pub mod gateway;
pub mod identity;
#[cfg(test)]
pub mod mock;
pub mod rest;

pub use contracts::{ContractCall, ContractFunction, ContractGateway};
pub use gateway::{
    BlockEvents, CallKind, ChaincodeEvent, CommitStatus, EndorsedTransaction, EventStream,
    GatewayError, GatewayResult, GatewaySession, GatewayTimeouts, LedgerConnector,
};
pub use identity::{Identity, IdentityError, IdentityWallet};
pub use rest::{RestConnector, RestSession};
