// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger gateway seams.
//!
//! [`LedgerConnector`] opens a [`GatewaySession`] bound to one channel and
//! chaincode. A session is an explicit value owned by whichever component
//! opened it and is closed by that component; nothing here is global.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use super::identity::Identity;

// =============================================================================
// Call classes and deadlines
// =============================================================================

/// Gateway call classes, each with its own deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Evaluate,
    Endorse,
    Submit,
    CommitStatus,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CallKind::Evaluate => "evaluate",
            CallKind::Endorse => "endorse",
            CallKind::Submit => "submit",
            CallKind::CommitStatus => "commit-status",
        })
    }
}

/// Per-call-class deadlines. The event stream has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayTimeouts {
    pub evaluate: Duration,
    pub endorse: Duration,
    pub submit: Duration,
    pub commit_status: Duration,
}

impl Default for GatewayTimeouts {
    fn default() -> Self {
        Self {
            evaluate: Duration::from_secs(5),
            endorse: Duration::from_secs(15),
            submit: Duration::from_secs(5),
            commit_status: Duration::from_secs(60),
        }
    }
}

impl GatewayTimeouts {
    pub fn for_call(&self, kind: CallKind) -> Duration {
        match kind {
            CallKind::Evaluate => self.evaluate,
            CallKind::Endorse => self.endorse,
            CallKind::Submit => self.submit,
            CallKind::CommitStatus => self.commit_status,
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("ledger gateway unreachable: {0}")]
    Connection(String),

    #[error("invalid identity: {0}")]
    Identity(String),

    #[error("{call} call timed out after {timeout:?}")]
    Timeout { call: CallKind, timeout: Duration },

    #[error("endorsement failed: {0}")]
    Endorsement(String),

    #[error("transaction rejected by ordering service: {0}")]
    Submit(String),

    #[error("commit status request rejected: {0}")]
    Commit(String),

    #[error("chaincode error: {0}")]
    Chaincode(String),

    #[error("event stream failed: {0}")]
    Stream(String),

    #[error("unexpected gateway response: {0}")]
    Protocol(String),

    #[error("gateway session is closed")]
    Closed,
}

impl GatewayError {
    /// Transient failures a caller may retry with a fresh round.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout { .. } | GatewayError::Endorsement(_)
        )
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// Wire-level values
// =============================================================================

/// One chaincode event from a committed, valid transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaincodeEvent {
    pub tx_id: String,
    pub event_name: String,
    /// UTF-8 JSON as emitted by chaincode.
    pub payload: Vec<u8>,
}

/// The chaincode events of one block, in block order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEvents {
    pub block_number: u64,
    pub events: Vec<ChaincodeEvent>,
}

/// Ordered, unbounded block stream. Ends only when the gateway closes it.
pub type EventStream = BoxStream<'static, GatewayResult<BlockEvents>>;

/// Result of a successful endorsement: the transaction still to be signed
/// and the chaincode response it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndorsedTransaction {
    pub bytes: Vec<u8>,
    pub result: Vec<u8>,
}

/// Final status of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStatus {
    pub tx_id: String,
    /// Fabric validation code; 0 is VALID.
    pub code: i32,
    pub successful: bool,
    pub block_number: u64,
}

// =============================================================================
// Seams
// =============================================================================

/// Opens sessions against a ledger network.
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    /// Fails with [`GatewayError::Connection`] or [`GatewayError::Identity`].
    async fn connect(&self, channel: &str, chaincode: &str) -> GatewayResult<Box<dyn GatewaySession>>;
}

/// A live connection to one chaincode on one channel.
#[async_trait]
pub trait GatewaySession: Send + Sync {
    fn channel(&self) -> &str;

    fn chaincode(&self) -> &str;

    /// Identity the session acts as (creator of offline-signed proposals).
    fn identity(&self) -> &Identity;

    /// Read-only query.
    async fn evaluate(&self, function: &str, args: &[String]) -> GatewayResult<Vec<u8>>;

    /// State-changing call signed by the session's own identity.
    async fn submit(&self, function: &str, args: &[String]) -> GatewayResult<Vec<u8>>;

    /// Chaincode events from `start_block` onwards.
    async fn chaincode_events(&self, start_block: u64) -> GatewayResult<EventStream>;

    /// Send a caller-signed proposal to the endorsing peers.
    async fn endorse(&self, proposal: &[u8], signature: &[u8]) -> GatewayResult<EndorsedTransaction>;

    /// Send a caller-signed transaction to the ordering service.
    async fn submit_transaction(&self, transaction: &[u8], signature: &[u8]) -> GatewayResult<()>;

    /// Wait for the commit status; `signature` is `None` when the
    /// deployment does not require a signed commit request.
    async fn commit_status(&self, request: &[u8], signature: Option<&[u8]>) -> GatewayResult<CommitStatus>;

    /// Release the session. Idempotent.
    async fn close(&self) -> GatewayResult<()>;
}
