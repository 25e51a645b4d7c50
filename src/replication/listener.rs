// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Block Listener
//!
//! Consumes the chaincode event stream of one channel/chaincode and mirrors
//! it into the replica store.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized ──init──► Connected ──run──► Listening ──► Closed | Failed
//! ```
//!
//! A listener owns a single subscription. Once `run` returns (or `init`
//! fails) the session is closed and the listener cannot be reused.
//!
//! ## Delivery
//!
//! Blocks are applied strictly in the order the ledger delivers them, one
//! event at a time. After every event of a block has been applied the next
//! block number is written to the checkpoint file. A crash between the
//! store write and the checkpoint replays that block on restart, which the
//! idempotent mutations absorb.
//!
//! Undecodable or malformed events are skipped with a warning. Unknown event
//! names are ignored. Stream errors and store errors end the run.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::events::{self, Mutation};
use crate::ledger::gateway::{BlockEvents, GatewayError, GatewaySession, LedgerConnector};
use crate::storage::checkpoint::{CheckpointError, CheckpointFile};
use crate::storage::replica::{ReplicaStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerState {
    Uninitialized,
    Connected,
    Listening,
    Closed,
    Failed,
}

/// Counters for one `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListenerStats {
    /// Blocks fully applied and checkpointed.
    pub blocks: u64,
    pub applied: u64,
    /// Events dropped because their payload could not be decoded or translated.
    pub skipped: u64,
    /// Events with a name outside the known set.
    pub ignored: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("listener has not been initialized")]
    NotInitialized,

    #[error("listener is {0:?} and cannot be reused")]
    AlreadyUsed(ListenerState),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("replica store error: {0}")]
    Store(#[from] StoreError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

pub struct BlockListener {
    connector: Arc<dyn LedgerConnector>,
    store: Arc<ReplicaStore>,
    checkpoint: CheckpointFile,
    state: ListenerState,
    session: Option<Box<dyn GatewaySession>>,
}

impl BlockListener {
    pub fn new(connector: Arc<dyn LedgerConnector>, store: Arc<ReplicaStore>, checkpoint: CheckpointFile) -> Self {
        Self {
            connector,
            store,
            checkpoint,
            state: ListenerState::Uninitialized,
            session: None,
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn checkpoint(&self) -> &CheckpointFile {
        &self.checkpoint
    }

    /// Open the gateway session.
    pub async fn init(&mut self, channel: &str, chaincode: &str) -> Result<(), ListenerError> {
        match self.state {
            ListenerState::Uninitialized => {}
            other => return Err(ListenerError::AlreadyUsed(other)),
        }

        match self.connector.connect(channel, chaincode).await {
            Ok(session) => {
                tracing::info!(channel, chaincode, "Listener connected");
                self.session = Some(session);
                self.state = ListenerState::Connected;
                Ok(())
            }
            Err(e) => {
                tracing::error!(channel, chaincode, error = %e, "Listener failed to connect");
                self.state = ListenerState::Failed;
                Err(e.into())
            }
        }
    }

    /// Listen until the stream ends, fails, or `shutdown` fires.
    ///
    /// The session is closed on every exit path.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<ListenerStats, ListenerError> {
        match self.state {
            ListenerState::Connected => {}
            ListenerState::Uninitialized => return Err(ListenerError::NotInitialized),
            other => return Err(ListenerError::AlreadyUsed(other)),
        }
        let Some(session) = self.session.take() else {
            return Err(ListenerError::NotInitialized);
        };

        self.state = ListenerState::Listening;
        let result = self.listen(session.as_ref(), &shutdown).await;

        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "Failed to close gateway session");
        }

        match &result {
            Ok(stats) => {
                self.state = ListenerState::Closed;
                tracing::info!(
                    blocks = stats.blocks,
                    applied = stats.applied,
                    skipped = stats.skipped,
                    ignored = stats.ignored,
                    "Listener closed"
                );
            }
            Err(e) => {
                self.state = ListenerState::Failed;
                tracing::error!(error = %e, "Listener failed");
            }
        }
        result
    }

    /// Release the session of a listener that was initialized but never run.
    pub async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                tracing::warn!(error = %e, "Failed to close gateway session");
            }
        }
        if matches!(self.state, ListenerState::Uninitialized | ListenerState::Connected) {
            self.state = ListenerState::Closed;
        }
    }

    async fn listen(
        &self,
        session: &dyn GatewaySession,
        shutdown: &CancellationToken,
    ) -> Result<ListenerStats, ListenerError> {
        let mut next_block = self.checkpoint.load()?;
        tracing::info!(
            channel = session.channel(),
            chaincode = session.chaincode(),
            start_block = next_block,
            "Listening for chaincode events"
        );

        let mut stream = session.chaincode_events(next_block).await?;
        let mut stats = ListenerStats::default();

        loop {
            let item = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Listener shutting down");
                    break;
                }
                item = stream.next() => item,
            };

            let Some(block) = item else {
                tracing::info!("Event stream ended");
                break;
            };
            let block = block?;

            if block.block_number < next_block {
                tracing::debug!(block = block.block_number, "Skipping block below checkpoint");
                continue;
            }

            self.apply_block(&block, &mut stats)?;

            next_block = block.block_number + 1;
            self.checkpoint.store(next_block)?;
            stats.blocks += 1;
            tracing::debug!(next_block, "Checkpoint stored");
        }

        Ok(stats)
    }

    fn apply_block(&self, block: &BlockEvents, stats: &mut ListenerStats) -> Result<(), ListenerError> {
        for event in &block.events {
            let payload = match events::decode_payload(&event.payload) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(
                        block = block.block_number,
                        tx_id = %event.tx_id,
                        event = %event.event_name,
                        error = %e,
                        "Skipping undecodable event"
                    );
                    stats.skipped += 1;
                    continue;
                }
            };

            match events::translate_named(&event.event_name, payload) {
                Ok(Some(mutation)) => {
                    self.apply(block.block_number, &mutation)?;
                    stats.applied += 1;
                }
                Ok(None) => {
                    tracing::warn!(
                        block = block.block_number,
                        event = %event.event_name,
                        "Ignoring unknown event"
                    );
                    stats.ignored += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        block = block.block_number,
                        tx_id = %event.tx_id,
                        event = %event.event_name,
                        error = %e,
                        "Skipping malformed event"
                    );
                    stats.skipped += 1;
                }
            }
        }
        Ok(())
    }

    fn apply(&self, block: u64, mutation: &Mutation) -> Result<(), ListenerError> {
        let outcome = mutation.apply(&self.store)?;
        tracing::debug!(
            block,
            collection = mutation.collection().name(),
            key = mutation.key(),
            outcome = ?outcome,
            "Applied event"
        );
        Ok(())
    }
}
