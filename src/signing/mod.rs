// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Offline Signing
//!
//! Transaction submission where the private key never enters this process.
//!
//! - `signer` - the sign(digest) capability and a local PEM-backed signer
//! - `envelope` - proposal and commit-request artifacts and their digests
//! - `offline` - the proposal / transaction / commit rounds

pub mod envelope;
pub mod offline;
pub mod signer;

pub use offline::{
    CommitOutcome, CommitSigning, OfflineSigner, SubmitError, UnsignedCommit, UnsignedProposal,
    UnsignedTransaction,
};
pub use signer::{KeySigner, Signer, SignerError};
