// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-built artifacts of the offline signing rounds.
//!
//! The proposal and the commit-status request are assembled here; the
//! transaction in between is assembled by the gateway from the endorsements
//! and treated as opaque bytes. Every artifact is signed over its SHA-256
//! digest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use uuid::Uuid;

use crate::ledger::identity::Identity;

/// SHA-256 of a to-be-signed artifact.
pub type Digest = [u8; 32];

pub fn digest(bytes: &[u8]) -> Digest {
    Sha256::digest(bytes).into()
}

/// Hex SHA-256 over an artifact and the signature it was submitted with.
///
/// Binds the next round to what was actually submitted, signature included.
pub fn signed_artifact_hash(bytes: &[u8], signature: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update(signature);
    hex::encode(hasher.finalize())
}

/// Transaction id: hex SHA-256 of the nonce followed by the creator.
pub fn transaction_id(nonce: &[u8], creator: &Identity) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(creator.msp_id.as_bytes());
    hasher.update(creator.certificate.as_bytes());
    hex::encode(hasher.finalize())
}

/// Unsigned chaincode proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalPayload {
    pub channel_id: String,
    pub chaincode_id: String,
    pub function: String,
    pub args: Vec<String>,
    pub creator: Identity,
    /// Hex-encoded random nonce.
    pub nonce: String,
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ProposalPayload {
    pub fn new(
        channel_id: &str,
        chaincode_id: &str,
        function: &str,
        args: Vec<String>,
        creator: Identity,
    ) -> Self {
        let nonce = Uuid::new_v4();
        let tx_id = transaction_id(nonce.as_bytes(), &creator);
        Self {
            channel_id: channel_id.to_string(),
            chaincode_id: chaincode_id.to_string(),
            function: function.to_string(),
            args,
            creator,
            nonce: hex::encode(nonce.as_bytes()),
            tx_id,
            timestamp: Utc::now(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Unsigned request for the commit status of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitStatusRequest {
    pub channel_id: String,
    pub tx_id: String,
    pub identity: Identity,
    /// [`signed_artifact_hash`] of the submitted transaction.
    pub transaction_hash: String,
}

impl CommitStatusRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
