// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Offline transaction signing.
//!
//! The service builds each artifact and hands out its digest; the caller
//! signs it wherever the key lives and hands the signature back.
//!
//! ```text
//! build_proposal ──► UnsignedProposal ──sign──► endorse_proposal
//!     ──► UnsignedTransaction ──sign──► submit_transaction
//!     ──► UnsignedCommit ──sign──► submit_commit ──► CommitOutcome
//! ```
//!
//! Each round consumes the previous round's value, so rounds cannot be
//! skipped or replayed out of order. The commit request embeds the hash of
//! the signed transaction, so its digest depends on what was actually
//! submitted.
//!
//! Errors from the gateway come back unmodified. Nothing is retried here:
//! a retry needs a fresh digest and therefore a fresh signature.

use super::envelope::{self, CommitStatusRequest, Digest, ProposalPayload};
use super::signer::{Signer, SignerError};
use crate::ledger::contracts::ContractCall;
use crate::ledger::gateway::{CommitStatus, GatewayError, GatewayResult, GatewaySession};

/// Whether the ordering service wants a signed commit-status request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitSigning {
    /// Three rounds: proposal, transaction, commit.
    #[default]
    Required,
    /// Two rounds: the commit status is requested unsigned.
    Skipped,
}

impl From<bool> for CommitSigning {
    fn from(required: bool) -> Self {
        if required {
            CommitSigning::Required
        } else {
            CommitSigning::Skipped
        }
    }
}

/// Round 1 output: proposal bytes and the digest to sign.
#[derive(Debug, Clone)]
pub struct UnsignedProposal {
    pub tx_id: String,
    pub bytes: Vec<u8>,
    pub digest: Digest,
}

/// Round 2 output: endorsed transaction bytes and the digest to sign.
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub tx_id: String,
    pub bytes: Vec<u8>,
    pub digest: Digest,
    /// Chaincode response captured at endorsement.
    pub result: Vec<u8>,
}

/// Round 3 output: commit-status request bytes and the digest to sign.
#[derive(Debug, Clone)]
pub struct UnsignedCommit {
    pub tx_id: String,
    pub bytes: Vec<u8>,
    pub digest: Digest,
    result: Vec<u8>,
}

/// Final status plus the result payload of the submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub status: CommitStatus,
    pub result: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Signer(#[from] SignerError),
}

/// Drives the offline rounds over a borrowed session.
pub struct OfflineSigner<'a> {
    session: &'a dyn GatewaySession,
    commit_signing: CommitSigning,
}

impl<'a> OfflineSigner<'a> {
    pub fn new(session: &'a dyn GatewaySession, commit_signing: CommitSigning) -> Self {
        Self {
            session,
            commit_signing,
        }
    }

    pub fn commit_signing(&self) -> CommitSigning {
        self.commit_signing
    }

    /// Build an unsigned proposal for `function(args)` on the session's
    /// chaincode, created by the session's identity.
    pub fn build_proposal(&self, function: &str, args: Vec<String>) -> GatewayResult<UnsignedProposal> {
        let payload = ProposalPayload::new(
            self.session.channel(),
            self.session.chaincode(),
            function,
            args,
            self.session.identity().clone(),
        );
        let bytes = payload
            .to_bytes()
            .map_err(|e| GatewayError::Protocol(format!("cannot encode proposal: {e}")))?;

        tracing::debug!(tx_id = %payload.tx_id, function, "Proposal built");
        Ok(UnsignedProposal {
            tx_id: payload.tx_id,
            digest: envelope::digest(&bytes),
            bytes,
        })
    }

    /// Send the signed proposal for endorsement.
    pub async fn endorse_proposal(
        &self,
        proposal: UnsignedProposal,
        signature: &[u8],
    ) -> GatewayResult<UnsignedTransaction> {
        let endorsed = self.session.endorse(&proposal.bytes, signature).await?;

        tracing::debug!(tx_id = %proposal.tx_id, "Proposal endorsed");
        Ok(UnsignedTransaction {
            tx_id: proposal.tx_id,
            digest: envelope::digest(&endorsed.bytes),
            bytes: endorsed.bytes,
            result: endorsed.result,
        })
    }

    /// Send the signed transaction to the orderer and build the commit
    /// request bound to it.
    pub async fn submit_transaction(
        &self,
        transaction: UnsignedTransaction,
        signature: &[u8],
    ) -> GatewayResult<UnsignedCommit> {
        self.session
            .submit_transaction(&transaction.bytes, signature)
            .await?;

        let request = CommitStatusRequest {
            channel_id: self.session.channel().to_string(),
            tx_id: transaction.tx_id.clone(),
            identity: self.session.identity().clone(),
            transaction_hash: envelope::signed_artifact_hash(&transaction.bytes, signature),
        };
        let bytes = request
            .to_bytes()
            .map_err(|e| GatewayError::Protocol(format!("cannot encode commit request: {e}")))?;

        tracing::debug!(tx_id = %transaction.tx_id, "Transaction submitted");
        Ok(UnsignedCommit {
            tx_id: transaction.tx_id,
            digest: envelope::digest(&bytes),
            bytes,
            result: transaction.result,
        })
    }

    /// Send the signed commit request and wait for the final status.
    pub async fn submit_commit(&self, commit: UnsignedCommit, signature: &[u8]) -> GatewayResult<CommitOutcome> {
        let status = self
            .session
            .commit_status(&commit.bytes, Some(signature))
            .await?;
        Ok(self.finish(commit, status))
    }

    /// Wait for the final status without a commit signature.
    pub async fn await_commit(&self, commit: UnsignedCommit) -> GatewayResult<CommitOutcome> {
        let status = self.session.commit_status(&commit.bytes, None).await?;
        Ok(self.finish(commit, status))
    }

    fn finish(&self, commit: UnsignedCommit, status: CommitStatus) -> CommitOutcome {
        if status.successful {
            tracing::info!(
                tx_id = %commit.tx_id,
                block = status.block_number,
                "Transaction committed"
            );
        } else {
            tracing::warn!(
                tx_id = %commit.tx_id,
                code = status.code,
                "Transaction failed validation"
            );
        }
        CommitOutcome {
            status,
            result: commit.result,
        }
    }

    /// Run every round against `signer`, honoring the commit-signing policy.
    pub async fn submit_tx(
        &self,
        signer: &dyn Signer,
        function: &str,
        args: Vec<String>,
    ) -> Result<CommitOutcome, SubmitError> {
        let proposal = self.build_proposal(function, args)?;
        let proposal_signature = signer.sign(&proposal.digest).await?;

        let transaction = self.endorse_proposal(proposal, &proposal_signature).await?;
        let transaction_signature = signer.sign(&transaction.digest).await?;

        let commit = self
            .submit_transaction(transaction, &transaction_signature)
            .await?;

        let outcome = match self.commit_signing {
            CommitSigning::Required => {
                let commit_signature = signer.sign(&commit.digest).await?;
                self.submit_commit(commit, &commit_signature).await?
            }
            CommitSigning::Skipped => self.await_commit(commit).await?,
        };
        Ok(outcome)
    }

    /// [`submit_tx`](Self::submit_tx) for a typed contract call.
    pub async fn submit_call(&self, signer: &dyn Signer, call: ContractCall) -> Result<CommitOutcome, SubmitError> {
        self.submit_tx(signer, call.function.qualified_name(), call.args)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::gateway::CallKind;
    use crate::ledger::mock::{stranger_signer, test_signer, MockLedger};
    use std::time::Duration;

    const CREATE: &str = "DataContract:CreateProduct";

    #[tokio::test]
    async fn three_rounds_commit_successfully() {
        let ledger = MockLedger::new();
        let session = ledger.session();
        let offline = OfflineSigner::new(&session, CommitSigning::Required);
        let signer = test_signer();

        let proposal = offline.build_proposal(CREATE, vec![r#"{"id":"P1"}"#.into()]).unwrap();
        let sig = signer.sign(&proposal.digest).await.unwrap();
        let transaction = offline.endorse_proposal(proposal, &sig).await.unwrap();

        let sig = signer.sign(&transaction.digest).await.unwrap();
        let commit = offline.submit_transaction(transaction, &sig).await.unwrap();

        let sig = signer.sign(&commit.digest).await.unwrap();
        let outcome = offline.submit_commit(commit, &sig).await.unwrap();

        assert!(outcome.status.successful);
        assert_eq!(outcome.status.code, 0);
        assert_eq!(outcome.result, br#"{"id":"P1"}"#.to_vec());
    }

    #[tokio::test]
    async fn each_round_has_its_own_digest() {
        let ledger = MockLedger::new();
        let session = ledger.session();
        let offline = OfflineSigner::new(&session, CommitSigning::Required);
        let signer = test_signer();

        let proposal = offline.build_proposal(CREATE, vec![]).unwrap();
        let proposal_digest = proposal.digest;
        let sig = signer.sign(&proposal.digest).await.unwrap();
        let transaction = offline.endorse_proposal(proposal, &sig).await.unwrap();
        assert_ne!(transaction.digest, proposal_digest);

        let sig = signer.sign(&transaction.digest).await.unwrap();
        let tx_digest = transaction.digest;
        let commit = offline.submit_transaction(transaction, &sig).await.unwrap();
        assert_ne!(commit.digest, tx_digest);
    }

    #[tokio::test]
    async fn proposal_signature_cannot_sign_transaction() {
        let ledger = MockLedger::new();
        let session = ledger.session();
        let offline = OfflineSigner::new(&session, CommitSigning::Required);
        let signer = test_signer();

        let proposal = offline.build_proposal(CREATE, vec![]).unwrap();
        let proposal_sig = signer.sign(&proposal.digest).await.unwrap();
        let transaction = offline.endorse_proposal(proposal, &proposal_sig).await.unwrap();

        let err = offline
            .submit_transaction(transaction, &proposal_sig)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Submit(_)), "{err}");
    }

    #[tokio::test]
    async fn wrong_digest_fails_endorsement() {
        let ledger = MockLedger::new();
        let session = ledger.session();
        let offline = OfflineSigner::new(&session, CommitSigning::Required);
        let signer = test_signer();

        let first = offline.build_proposal(CREATE, vec![]).unwrap();
        let second = offline.build_proposal(CREATE, vec![]).unwrap();
        let sig_for_first = signer.sign(&first.digest).await.unwrap();

        let err = offline.endorse_proposal(second, &sig_for_first).await.unwrap_err();
        assert!(matches!(err, GatewayError::Endorsement(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn transaction_signature_cannot_sign_commit() {
        let ledger = MockLedger::new();
        let session = ledger.session();
        let offline = OfflineSigner::new(&session, CommitSigning::Required);
        let signer = test_signer();

        let proposal = offline.build_proposal(CREATE, vec![]).unwrap();
        let sig = signer.sign(&proposal.digest).await.unwrap();
        let transaction = offline.endorse_proposal(proposal, &sig).await.unwrap();
        let tx_sig = signer.sign(&transaction.digest).await.unwrap();
        let commit = offline.submit_transaction(transaction, &tx_sig).await.unwrap();

        let err = offline.submit_commit(commit, &tx_sig).await.unwrap_err();
        assert!(matches!(err, GatewayError::Commit(_)));
    }

    #[tokio::test]
    async fn untrusted_key_is_rejected() {
        let ledger = MockLedger::new();
        let session = ledger.session();
        let offline = OfflineSigner::new(&session, CommitSigning::Required);

        let err = offline
            .submit_tx(&stranger_signer(), CREATE, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Gateway(GatewayError::Endorsement(_))));
    }

    #[tokio::test]
    async fn two_round_variant_when_commit_signing_is_skipped() {
        let ledger = MockLedger::new();
        ledger.set_require_commit_signature(false);
        let session = ledger.session();
        let offline = OfflineSigner::new(&session, CommitSigning::Skipped);

        let outcome = offline
            .submit_call(&test_signer(), ContractCall::delete_product("P1"))
            .await
            .unwrap();
        assert!(outcome.status.successful);
        assert_eq!(outcome.result, b"P1".to_vec());
        assert!(ledger
            .invocations()
            .iter()
            .any(|(f, _)| f == "DataContract:DeleteProduct"));
    }

    #[tokio::test]
    async fn unsigned_commit_is_refused_when_required() {
        let ledger = MockLedger::new();
        let session = ledger.session();
        let offline = OfflineSigner::new(&session, CommitSigning::Skipped);

        let err = offline
            .submit_tx(&test_signer(), CREATE, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Gateway(GatewayError::Commit(_))));
    }

    #[tokio::test]
    async fn gateway_errors_pass_through_unmodified() {
        let ledger = MockLedger::new();
        ledger.fail_next(
            CallKind::Endorse,
            GatewayError::Timeout {
                call: CallKind::Endorse,
                timeout: Duration::from_secs(15),
            },
        );
        ledger.reject_function("DataContract:BuyProduct");
        let session = ledger.session();
        let offline = OfflineSigner::new(&session, CommitSigning::Required);
        let signer = test_signer();

        let err = offline.submit_tx(&signer, CREATE, vec![]).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Gateway(GatewayError::Timeout { call: CallKind::Endorse, .. })
        ));

        // Caller retries with a fresh proposal
        assert!(offline.submit_tx(&signer, CREATE, vec![]).await.is_ok());

        let err = offline
            .submit_tx(&signer, "DataContract:BuyProduct", vec!["P1".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Gateway(GatewayError::Endorsement(_))));
    }

    #[test]
    fn commit_signing_from_flag() {
        assert_eq!(CommitSigning::from(true), CommitSigning::Required);
        assert_eq!(CommitSigning::from(false), CommitSigning::Skipped);
    }
}
