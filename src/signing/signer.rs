// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The external "sign(digest) -> signature" capability.
//!
//! The service path only ever hands a 32-byte digest to a [`Signer`]. Where
//! the key lives (HSM, browser wallet, another process) is the signer's
//! business. [`KeySigner`] is a local implementation backed by a PEM key
//! file, for tooling and tests.

use std::path::Path;

use async_trait::async_trait;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::SecretKey;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    #[error("failed to read key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("signer declined: {0}")]
    Declined(String),
}

/// Signs message digests. Returns a DER-encoded ECDSA signature.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, SignerError>;
}

/// Local ECDSA key signer.
pub struct KeySigner {
    key: SigningKey,
}

impl KeySigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Parse a PEM private key (SEC1 `EC PRIVATE KEY` or PKCS#8 `PRIVATE KEY`).
    pub fn from_pem(pem_str: &str) -> Result<Self, SignerError> {
        let block = pem::parse(pem_str)
            .map_err(|e| SignerError::InvalidKey(format!("Invalid PEM: {e}")))?;

        let secret_key = match block.tag() {
            "EC PRIVATE KEY" => SecretKey::from_sec1_der(block.contents())
                .map_err(|e| SignerError::InvalidKey(format!("Invalid SEC1 key: {e}")))?,
            "PRIVATE KEY" => {
                use k256::pkcs8::DecodePrivateKey;
                SecretKey::from_pkcs8_der(block.contents())
                    .map_err(|e| SignerError::InvalidKey(format!("Invalid PKCS#8 key: {e}")))?
            }
            other => {
                return Err(SignerError::InvalidKey(format!(
                    "unsupported PEM block {other}"
                )))
            }
        };

        Ok(Self::new(SigningKey::from(secret_key)))
    }

    pub fn from_pem_file(path: &Path) -> Result<Self, SignerError> {
        let pem_str = std::fs::read_to_string(path).map_err(|source| SignerError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_pem(&pem_str)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        *self.key.verifying_key()
    }
}

#[async_trait]
impl Signer for KeySigner {
    async fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, SignerError> {
        let signature: Signature = self
            .key
            .sign_prehash(digest)
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        Ok(signature.to_der().as_bytes().to_vec())
    }
}
