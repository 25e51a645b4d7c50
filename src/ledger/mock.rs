// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory ledger for tests.
//!
//! Holds authoritative documents for queries, a scripted block sequence for
//! the event stream, and a creator key against which every offline-signed
//! artifact is verified.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::gateway::{
    BlockEvents, CallKind, ChaincodeEvent, CommitStatus, EndorsedTransaction, EventStream,
    GatewayError, GatewayResult, GatewaySession, LedgerConnector,
};
use super::identity::Identity;
use crate::signing::envelope::{digest, signed_artifact_hash, CommitStatusRequest, ProposalPayload};
use crate::signing::KeySigner;

const TEST_CERT: &str = "-----BEGIN CERTIFICATE-----\nMIIBszCCAVmgAwIBAgIUbW9jay1sZWRnZXItY3JlYXRvcjAKBggqhkjOPQQDAjAA\n-----END CERTIFICATE-----\n";

/// Signer holding the key the mock ledger trusts.
pub fn test_signer() -> KeySigner {
    KeySigner::new(test_signing_key())
}

/// A signer the mock ledger does not trust.
pub fn stranger_signer() -> KeySigner {
    KeySigner::new(SigningKey::from_slice(&[9u8; 32]).expect("valid scalar"))
}

fn test_signing_key() -> SigningKey {
    SigningKey::from_slice(&[7u8; 32]).expect("valid scalar")
}

/// Stream step the ledger will deliver.
#[derive(Debug, Clone)]
enum Scripted {
    Block(BlockEvents),
    Failure(String),
}

/// Transaction bytes as this ledger assembles them after endorsement.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MockTransaction {
    tx_id: String,
    proposal_hash: String,
    function: String,
    result: Vec<u8>,
}

#[derive(Debug)]
struct Submitted {
    transaction_hash: String,
    block_number: u64,
}

#[derive(Default)]
struct State {
    users: BTreeMap<String, Value>,
    products: BTreeMap<String, Value>,
    agreements: BTreeMap<String, Value>,
    script: Vec<Scripted>,
    endorsed: HashMap<String, Vec<u8>>,
    submitted: HashMap<String, Submitted>,
    invocations: Vec<(String, Vec<String>)>,
    fail_next: Vec<(CallKind, GatewayError)>,
    rejected_functions: Vec<String>,
}

struct Inner {
    state: Mutex<State>,
    creator_key: VerifyingKey,
    identity: Identity,
    require_commit_signature: AtomicBool,
    hold_stream_open: AtomicBool,
    refuse_connections: AtomicBool,
    next_block: AtomicU64,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
    stream_starts: Mutex<Vec<u64>>,
}

/// Shared handle on the in-memory ledger.
#[derive(Clone)]
pub struct MockLedger {
    inner: Arc<Inner>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                creator_key: *test_signing_key().verifying_key(),
                identity: Identity::new("Org1MSP", TEST_CERT),
                require_commit_signature: AtomicBool::new(true),
                hold_stream_open: AtomicBool::new(false),
                refuse_connections: AtomicBool::new(false),
                next_block: AtomicU64::new(1),
                sessions_opened: AtomicUsize::new(0),
                sessions_closed: AtomicUsize::new(0),
                stream_starts: Mutex::new(Vec::new()),
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ---- authoritative state -------------------------------------------

    pub fn put_user(&self, user: Value) {
        let key = user["username"].as_str().unwrap_or_default().to_string();
        self.state().users.insert(key, user);
    }

    pub fn put_product(&self, product: Value) {
        let key = product["id"].as_str().unwrap_or_default().to_string();
        self.state().products.insert(key, product);
    }

    pub fn put_agreement(&self, agreement: Value) {
        let key = agreement["txID"].as_str().unwrap_or_default().to_string();
        self.state().agreements.insert(key, agreement);
    }

    // ---- event stream --------------------------------------------------

    /// Append a block to the stream.
    pub fn push_block(&self, block_number: u64, events: Vec<(&str, Value)>) {
        let events = events
            .into_iter()
            .enumerate()
            .map(|(i, (name, payload))| ChaincodeEvent {
                tx_id: format!("tx-{block_number}-{i}"),
                event_name: name.to_string(),
                payload: payload.to_string().into_bytes(),
            })
            .collect();
        self.push_raw_block(BlockEvents {
            block_number,
            events,
        });
    }

    pub fn push_raw_block(&self, block: BlockEvents) {
        self.state().script.push(Scripted::Block(block));
    }

    /// Make the stream fail at this point.
    pub fn push_stream_failure(&self, message: &str) {
        self.state().script.push(Scripted::Failure(message.to_string()));
    }

    /// Keep the stream pending after the script instead of ending it.
    pub fn hold_stream_open(&self) {
        self.inner.hold_stream_open.store(true, Ordering::SeqCst);
    }

    /// Start positions requested by every subscription so far.
    pub fn stream_starts(&self) -> Vec<u64> {
        self.inner
            .stream_starts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    // ---- failure injection ---------------------------------------------

    pub fn refuse_connections(&self) {
        self.inner.refuse_connections.store(true, Ordering::SeqCst);
    }

    pub fn fail_next(&self, kind: CallKind, error: GatewayError) {
        self.state().fail_next.push((kind, error));
    }

    /// Endorsing peers reject proposals for this function.
    pub fn reject_function(&self, function: &str) {
        self.state().rejected_functions.push(function.to_string());
    }

    pub fn set_require_commit_signature(&self, required: bool) {
        self.inner
            .require_commit_signature
            .store(required, Ordering::SeqCst);
    }

    // ---- inspection ----------------------------------------------------

    pub fn invocations(&self) -> Vec<(String, Vec<String>)> {
        self.state().invocations.clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.inner.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.inner.sessions_closed.load(Ordering::SeqCst)
    }

    pub fn identity(&self) -> Identity {
        self.inner.identity.clone()
    }

    // ---- handles -------------------------------------------------------

    pub fn session(&self) -> MockSession {
        self.inner.sessions_opened.fetch_add(1, Ordering::SeqCst);
        MockSession {
            ledger: self.clone(),
            channel: "mychannel".to_string(),
            chaincode: "marketplace".to_string(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector {
            ledger: self.clone(),
        }
    }

    fn take_failure(&self, kind: CallKind) -> GatewayResult<()> {
        let mut state = self.state();
        match state.fail_next.iter().position(|(k, _)| *k == kind) {
            Some(index) => Err(state.fail_next.remove(index).1),
            None => Ok(()),
        }
    }

    fn verify(&self, bytes: &[u8], signature: &[u8]) -> bool {
        Signature::from_der(signature)
            .map(|sig| {
                self.inner
                    .creator_key
                    .verify_prehash(&digest(bytes), &sig)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

pub struct MockConnector {
    ledger: MockLedger,
}

#[async_trait]
impl LedgerConnector for MockConnector {
    async fn connect(&self, channel: &str, chaincode: &str) -> GatewayResult<Box<dyn GatewaySession>> {
        if self.ledger.inner.refuse_connections.load(Ordering::SeqCst) {
            return Err(GatewayError::Connection("connection refused".to_string()));
        }
        let mut session = self.ledger.session();
        session.channel = channel.to_string();
        session.chaincode = chaincode.to_string();
        Ok(Box::new(session))
    }
}

pub struct MockSession {
    ledger: MockLedger,
    channel: String,
    chaincode: String,
    closed: AtomicBool,
}

impl MockSession {
    fn ensure_open(&self) -> GatewayResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(GatewayError::Closed)
        } else {
            Ok(())
        }
    }
}

fn arg<'a>(args: &'a [String], index: usize) -> GatewayResult<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| GatewayError::Chaincode(format!("missing argument {index}")))
}

fn list(docs: &BTreeMap<String, Value>) -> GatewayResult<Vec<u8>> {
    serde_json::to_vec(&docs.values().collect::<Vec<_>>())
        .map_err(|e| GatewayError::Protocol(e.to_string()))
}

fn one(docs: &BTreeMap<String, Value>, key: &str) -> GatewayResult<Vec<u8>> {
    docs.get(key)
        .ok_or_else(|| GatewayError::Chaincode(format!("{key} does not exist")))
        .and_then(|doc| serde_json::to_vec(doc).map_err(|e| GatewayError::Protocol(e.to_string())))
}

#[async_trait]
impl GatewaySession for MockSession {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn chaincode(&self) -> &str {
        &self.chaincode
    }

    fn identity(&self) -> &Identity {
        &self.ledger.inner.identity
    }

    async fn evaluate(&self, function: &str, args: &[String]) -> GatewayResult<Vec<u8>> {
        self.ensure_open()?;
        self.ledger.take_failure(CallKind::Evaluate)?;

        let state = self.ledger.state();
        match function {
            "UserContract:GetAllUsers" => list(&state.users),
            "DataContract:GetAllProducts" => list(&state.products),
            "AgreementContract:GetAgreements" => list(&state.agreements),
            "UserContract:ReadUser" => one(&state.users, arg(args, 0)?),
            "DataContract:ReadProduct" => one(&state.products, arg(args, 0)?),
            "AgreementContract:GetAgreement" => one(&state.agreements, arg(args, 0)?),
            other => Err(GatewayError::Chaincode(format!("unknown function {other}"))),
        }
    }

    async fn submit(&self, function: &str, args: &[String]) -> GatewayResult<Vec<u8>> {
        self.ensure_open()?;
        self.ledger.take_failure(CallKind::Submit)?;
        self.ledger
            .state()
            .invocations
            .push((function.to_string(), args.to_vec()));
        Ok(Vec::new())
    }

    async fn chaincode_events(&self, start_block: u64) -> GatewayResult<EventStream> {
        self.ensure_open()?;
        self.ledger
            .inner
            .stream_starts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(start_block);

        let items: Vec<GatewayResult<BlockEvents>> = self
            .ledger
            .state()
            .script
            .iter()
            .filter_map(|step| match step {
                Scripted::Block(block) if block.block_number >= start_block => Some(Ok(block.clone())),
                Scripted::Block(_) => None,
                Scripted::Failure(message) => Some(Err(GatewayError::Stream(message.clone()))),
            })
            .collect();

        let scripted = stream::iter(items);
        if self.ledger.inner.hold_stream_open.load(Ordering::SeqCst) {
            Ok(scripted.chain(stream::pending()).boxed())
        } else {
            Ok(scripted.boxed())
        }
    }

    async fn endorse(&self, proposal: &[u8], signature: &[u8]) -> GatewayResult<EndorsedTransaction> {
        self.ensure_open()?;
        self.ledger.take_failure(CallKind::Endorse)?;

        if !self.ledger.verify(proposal, signature) {
            return Err(GatewayError::Endorsement(
                "proposal signature does not match creator".to_string(),
            ));
        }
        let payload = ProposalPayload::from_bytes(proposal)
            .map_err(|e| GatewayError::Endorsement(format!("malformed proposal: {e}")))?;

        let mut state = self.ledger.state();
        if state.rejected_functions.contains(&payload.function) {
            return Err(GatewayError::Endorsement(format!(
                "chaincode rejected {}",
                payload.function
            )));
        }

        let result = payload.args.first().cloned().unwrap_or_default().into_bytes();
        let transaction = MockTransaction {
            tx_id: payload.tx_id.clone(),
            proposal_hash: signed_artifact_hash(proposal, signature),
            function: payload.function,
            result: result.clone(),
        };
        let bytes =
            serde_json::to_vec(&transaction).map_err(|e| GatewayError::Protocol(e.to_string()))?;
        state.endorsed.insert(payload.tx_id, bytes.clone());

        Ok(EndorsedTransaction { bytes, result })
    }

    async fn submit_transaction(&self, transaction: &[u8], signature: &[u8]) -> GatewayResult<()> {
        self.ensure_open()?;
        self.ledger.take_failure(CallKind::Submit)?;

        if !self.ledger.verify(transaction, signature) {
            return Err(GatewayError::Submit(
                "transaction signature does not match creator".to_string(),
            ));
        }
        let parsed: MockTransaction = serde_json::from_slice(transaction)
            .map_err(|e| GatewayError::Submit(format!("malformed transaction: {e}")))?;

        let mut state = self.ledger.state();
        if state.endorsed.get(&parsed.tx_id).map(Vec::as_slice) != Some(transaction) {
            return Err(GatewayError::Submit(format!(
                "transaction {} was not endorsed",
                parsed.tx_id
            )));
        }

        let block_number = self.ledger.inner.next_block.fetch_add(1, Ordering::SeqCst);
        state.invocations.push((parsed.function, Vec::new()));
        state.submitted.insert(
            parsed.tx_id,
            Submitted {
                transaction_hash: signed_artifact_hash(transaction, signature),
                block_number,
            },
        );
        Ok(())
    }

    async fn commit_status(&self, request: &[u8], signature: Option<&[u8]>) -> GatewayResult<CommitStatus> {
        self.ensure_open()?;
        self.ledger.take_failure(CallKind::CommitStatus)?;

        match signature {
            Some(signature) if !self.ledger.verify(request, signature) => {
                return Err(GatewayError::Commit(
                    "commit request signature does not match creator".to_string(),
                ))
            }
            None if self.ledger.inner.require_commit_signature.load(Ordering::SeqCst) => {
                return Err(GatewayError::Commit("commit request must be signed".to_string()))
            }
            _ => {}
        }

        let parsed = CommitStatusRequest::from_bytes(request)
            .map_err(|e| GatewayError::Commit(format!("malformed commit request: {e}")))?;

        let state = self.ledger.state();
        let submitted = state.submitted.get(&parsed.tx_id).ok_or_else(|| {
            GatewayError::Commit(format!("transaction {} was not submitted", parsed.tx_id))
        })?;
        if submitted.transaction_hash != parsed.transaction_hash {
            return Err(GatewayError::Commit(
                "commit request does not match the submitted transaction".to_string(),
            ));
        }

        Ok(CommitStatus {
            tx_id: parsed.tx_id,
            code: 0,
            successful: true,
            block_number: submitted.block_number,
        })
    }

    async fn close(&self) -> GatewayResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.ledger.inner.sessions_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
