// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway adapter over the Fabric REST gateway sidecar.
//!
//! ## Endpoints
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | POST | `/client/` | identity + channel/chaincode | 200 |
//! | POST | `/client/query` | `{chaincodeid, channelid, function, args}` | raw result |
//! | POST | `/client/invoke` | same | raw result |
//! | POST | `/client/proposal/endorse` | `{proposal, signature}` (base64) | `{transaction, result}` |
//! | POST | `/client/transaction/submit` | `{transaction, signature}` | 200 |
//! | POST | `/client/commit/status` | `{request, signature?}` | `{transactionId, code, successful, blockNumber}` |
//! | GET | `/client/events?channelid&chaincodeid&startBlock` | - | NDJSON block frames |
//!
//! Each call class gets its own deadline; the event stream has none.

use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use futures_util::stream::{self, StreamExt};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use super::gateway::{
    BlockEvents, CallKind, ChaincodeEvent, CommitStatus, EndorsedTransaction, EventStream,
    GatewayError, GatewayResult, GatewaySession, GatewayTimeouts, LedgerConnector,
};
use super::identity::Identity;

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClientSetup<'a> {
    msp_id: &'a str,
    certificate: &'a str,
    #[serde(rename = "channelid")]
    channel_id: &'a str,
    #[serde(rename = "chaincodeid")]
    chaincode_id: &'a str,
}

#[derive(Serialize)]
struct RequestBody<'a> {
    #[serde(rename = "chaincodeid")]
    chaincode_id: &'a str,
    #[serde(rename = "channelid")]
    channel_id: &'a str,
    function: &'a str,
    args: &'a [String],
}

#[derive(Serialize)]
struct SignedProposal {
    proposal: String,
    signature: String,
}

#[derive(Deserialize)]
struct EndorseResponse {
    transaction: String,
    #[serde(default)]
    result: String,
}

#[derive(Serialize)]
struct SignedTransaction {
    transaction: String,
    signature: String,
}

#[derive(Serialize)]
struct SignedCommitRequest {
    request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    transaction_id: String,
    code: i32,
    successful: bool,
    block_number: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventFrame {
    block_number: u64,
    #[serde(default)]
    events: Vec<EventRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRecord {
    #[serde(default)]
    tx_id: String,
    event_name: String,
    /// base64
    #[serde(default)]
    payload: String,
}

fn decode_b64(field: &str, value: &str) -> GatewayResult<Vec<u8>> {
    Base64::decode_vec(value)
        .map_err(|e| GatewayError::Protocol(format!("{field} is not valid base64: {e}")))
}

/// Parse one NDJSON block frame.
///
/// A payload that is not valid base64 is a per-event fault: the event is
/// kept with an empty payload, which the translator rejects, so the rest of
/// the block still applies.
pub(crate) fn decode_frame(line: &[u8]) -> GatewayResult<BlockEvents> {
    let frame: EventFrame = serde_json::from_slice(line)
        .map_err(|e| GatewayError::Stream(format!("malformed block frame: {e}")))?;

    let block_number = frame.block_number;
    let events = frame
        .events
        .into_iter()
        .map(|record| {
            let payload = decode_b64("event payload", &record.payload).unwrap_or_else(|e| {
                tracing::warn!(
                    block = block_number,
                    tx_id = %record.tx_id,
                    event = %record.event_name,
                    error = %e,
                    "Dropping undecodable event payload"
                );
                Vec::new()
            });
            ChaincodeEvent {
                tx_id: record.tx_id,
                event_name: record.event_name,
                payload,
            }
        })
        .collect();

    Ok(BlockEvents {
        block_number,
        events,
    })
}

// =============================================================================
// Connector
// =============================================================================

/// Opens [`RestSession`]s against one sidecar.
pub struct RestConnector {
    base_url: Url,
    identity: Identity,
    timeouts: GatewayTimeouts,
    http: Client,
}

impl RestConnector {
    pub fn new(mut base_url: Url, identity: Identity, timeouts: GatewayTimeouts) -> GatewayResult<Self> {
        // Relative joins replace the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GatewayError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            identity,
            timeouts,
            http,
        })
    }
}

#[async_trait]
impl LedgerConnector for RestConnector {
    async fn connect(&self, channel: &str, chaincode: &str) -> GatewayResult<Box<dyn GatewaySession>> {
        let session = RestSession {
            base_url: self.base_url.clone(),
            identity: self.identity.clone(),
            channel: channel.to_string(),
            chaincode: chaincode.to_string(),
            timeouts: self.timeouts,
            http: self.http.clone(),
        };

        let setup = ClientSetup {
            msp_id: &self.identity.msp_id,
            certificate: &self.identity.certificate,
            channel_id: channel,
            chaincode_id: chaincode,
        };
        let response = session
            .send(
                CallKind::Evaluate,
                session.http.post(session.url("client/")?).json(&setup),
            )
            .await?;

        match response.status().as_u16() {
            200..=299 => {}
            401 | 403 => {
                let body = response.text().await.unwrap_or_default();
                return Err(GatewayError::Identity(body));
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(GatewayError::Connection(format!(
                    "gateway setup returned {status}: {body}"
                )));
            }
        }

        tracing::info!(
            gateway = %self.base_url,
            channel,
            chaincode,
            msp_id = %self.identity.msp_id,
            "Ledger session opened"
        );
        Ok(Box::new(session))
    }
}

// =============================================================================
// Session
// =============================================================================

pub struct RestSession {
    base_url: Url,
    identity: Identity,
    channel: String,
    chaincode: String,
    timeouts: GatewayTimeouts,
    http: Client,
}

impl RestSession {
    fn url(&self, path: &str) -> GatewayResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| GatewayError::Connection(format!("invalid gateway URL: {e}")))
    }

    /// Send with the deadline of `kind`, mapping transport failures.
    async fn send(&self, kind: CallKind, request: RequestBuilder) -> GatewayResult<Response> {
        let timeout = self.timeouts.for_call(kind);
        request.timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout { call: kind, timeout }
            } else {
                GatewayError::Connection(e.to_string())
            }
        })
    }

    /// Send and require a 2xx, turning anything else into `reject(body)`.
    async fn call(
        &self,
        kind: CallKind,
        request: RequestBuilder,
        reject: fn(String) -> GatewayError,
    ) -> GatewayResult<Response> {
        let response = self.send(kind, request).await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(reject(format!("{status}: {body}")))
    }

    async fn body_bytes(&self, kind: CallKind, response: Response) -> GatewayResult<Vec<u8>> {
        let timeout = self.timeouts.for_call(kind);
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout { call: kind, timeout }
                } else {
                    GatewayError::Protocol(e.to_string())
                }
            })
    }

    fn request_body<'a>(&'a self, function: &'a str, args: &'a [String]) -> RequestBody<'a> {
        RequestBody {
            chaincode_id: &self.chaincode,
            channel_id: &self.channel,
            function,
            args,
        }
    }
}

#[async_trait]
impl GatewaySession for RestSession {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn chaincode(&self) -> &str {
        &self.chaincode
    }

    fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn evaluate(&self, function: &str, args: &[String]) -> GatewayResult<Vec<u8>> {
        let request = self
            .http
            .post(self.url("client/query")?)
            .json(&self.request_body(function, args));
        let response = self.call(CallKind::Evaluate, request, GatewayError::Chaincode).await?;
        self.body_bytes(CallKind::Evaluate, response).await
    }

    async fn submit(&self, function: &str, args: &[String]) -> GatewayResult<Vec<u8>> {
        let request = self
            .http
            .post(self.url("client/invoke")?)
            .json(&self.request_body(function, args));
        let response = self.call(CallKind::Submit, request, GatewayError::Submit).await?;
        self.body_bytes(CallKind::Submit, response).await
    }

    async fn chaincode_events(&self, start_block: u64) -> GatewayResult<EventStream> {
        let mut url = self.url("client/events")?;
        url.query_pairs_mut()
            .append_pair("channelid", &self.channel)
            .append_pair("chaincodeid", &self.chaincode)
            .append_pair("startBlock", &start_block.to_string());

        // No timeout: the stream blocks until the next block arrives
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| GatewayError::Connection(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Stream(format!("subscription returned {status}: {body}")));
        }

        let bytes = response.bytes_stream().boxed();
        let frames = stream::unfold((bytes, Vec::new(), false), |(mut bytes, mut buf, done)| async move {
            if done {
                return None;
            }
            loop {
                if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Some((decode_frame(&line), (bytes, buf, false)));
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        return Some((Err(GatewayError::Stream(e.to_string())), (bytes, buf, true)))
                    }
                    None if buf.iter().all(u8::is_ascii_whitespace) => return None,
                    None => {
                        let line = std::mem::take(&mut buf);
                        return Some((decode_frame(&line), (bytes, buf, true)));
                    }
                }
            }
        });

        Ok(frames.boxed())
    }

    async fn endorse(&self, proposal: &[u8], signature: &[u8]) -> GatewayResult<EndorsedTransaction> {
        let body = SignedProposal {
            proposal: Base64::encode_string(proposal),
            signature: Base64::encode_string(signature),
        };
        let request = self.http.post(self.url("client/proposal/endorse")?).json(&body);
        let response = self.call(CallKind::Endorse, request, GatewayError::Endorsement).await?;

        let parsed: EndorseResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(format!("invalid endorse response: {e}")))?;

        Ok(EndorsedTransaction {
            bytes: decode_b64("transaction", &parsed.transaction)?,
            result: decode_b64("result", &parsed.result)?,
        })
    }

    async fn submit_transaction(&self, transaction: &[u8], signature: &[u8]) -> GatewayResult<()> {
        let body = SignedTransaction {
            transaction: Base64::encode_string(transaction),
            signature: Base64::encode_string(signature),
        };
        let request = self.http.post(self.url("client/transaction/submit")?).json(&body);
        self.call(CallKind::Submit, request, GatewayError::Submit).await?;
        Ok(())
    }

    async fn commit_status(&self, request: &[u8], signature: Option<&[u8]>) -> GatewayResult<CommitStatus> {
        let body = SignedCommitRequest {
            request: Base64::encode_string(request),
            signature: signature.map(Base64::encode_string),
        };
        let http_request = self.http.post(self.url("client/commit/status")?).json(&body);
        let response = self
            .call(CallKind::CommitStatus, http_request, GatewayError::Commit)
            .await?;

        let parsed: StatusResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(format!("invalid commit status: {e}")))?;

        Ok(CommitStatus {
            tx_id: parsed.transaction_id,
            code: parsed.code,
            successful: parsed.successful,
            block_number: parsed.block_number,
        })
    }

    async fn close(&self) -> GatewayResult<()> {
        tracing::debug!(channel = %self.channel, chaincode = %self.chaincode, "Ledger session closed");
        Ok(())
    }
}
