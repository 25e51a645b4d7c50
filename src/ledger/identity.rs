// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fabric file-wallet identities.
//!
//! ```text
//! {wallet}/
//!   admin.id      # {"credentials":{"certificate":"...","privateKey":"..."},"mspId":"Org1MSP","type":"X.509","version":1}
//!   seller.id
//! ```
//!
//! Only the certificate and MSP id are read. Private key material stays in
//! the file; signing goes through a [`crate::signing::Signer`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const IDENTITY_EXTENSION: &str = "id";
const X509_TYPE: &str = "X.509";

/// Public half of an enrolled identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub msp_id: String,
    /// PEM-encoded X.509 certificate.
    pub certificate: String,
}

impl Identity {
    pub fn new(msp_id: impl Into<String>, certificate: impl Into<String>) -> Self {
        Self {
            msp_id: msp_id.into(),
            certificate: certificate.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity {username} not found in wallet ({path})")]
    NotFound { username: String, path: PathBuf },

    #[error("failed to read identity {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed identity {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("identity {username} has unsupported type {kind}")]
    UnsupportedType { username: String, kind: String },

    #[error("identity {username} certificate is not a PEM certificate: {reason}")]
    InvalidCertificate { username: String, reason: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletRecord {
    credentials: Credentials,
    msp_id: String,
    #[serde(rename = "type", default = "default_type")]
    kind: String,
}

#[derive(Deserialize)]
struct Credentials {
    certificate: String,
}

fn default_type() -> String {
    X509_TYPE.to_string()
}

/// Directory of `{username}.id` records.
#[derive(Debug, Clone)]
pub struct IdentityWallet {
    dir: PathBuf,
}

impl IdentityWallet {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{username}.{IDENTITY_EXTENSION}"))
    }

    pub fn exists(&self, username: &str) -> bool {
        self.path_for(username).is_file()
    }

    /// Load the public identity of `username`.
    pub fn get(&self, username: &str) -> Result<Identity, IdentityError> {
        let path = self.path_for(username);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(IdentityError::NotFound {
                    username: username.to_string(),
                    path,
                })
            }
            Err(source) => return Err(IdentityError::Io { path, source }),
        };

        let record: WalletRecord = serde_json::from_str(&raw)
            .map_err(|source| IdentityError::Malformed { path: path.clone(), source })?;

        if record.kind != X509_TYPE {
            return Err(IdentityError::UnsupportedType {
                username: username.to_string(),
                kind: record.kind,
            });
        }

        let parsed = pem::parse(&record.credentials.certificate).map_err(|e| {
            IdentityError::InvalidCertificate {
                username: username.to_string(),
                reason: e.to_string(),
            }
        })?;
        if parsed.tag() != "CERTIFICATE" {
            return Err(IdentityError::InvalidCertificate {
                username: username.to_string(),
                reason: format!("unexpected PEM block {}", parsed.tag()),
            });
        }

        Ok(Identity::new(record.msp_id, record.credentials.certificate))
    }

    /// Usernames with an identity record, sorted.
    pub fn list(&self) -> Result<Vec<String>, IdentityError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(IdentityError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == IDENTITY_EXTENSION))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) const TEST_CERT: &str = "-----BEGIN CERTIFICATE-----\nMIIBszCCAVmgAwIBAgIUZmFicmljLXJlcGxpY2EtdGVzdDAKBggqhkjOPQQDAjAA\n-----END CERTIFICATE-----\n";

    fn write_identity(dir: &Path, name: &str, record: serde_json::Value) {
        fs::write(dir.join(format!("{name}.id")), record.to_string()).unwrap();
    }

    #[test]
    fn loads_certificate_and_msp() {
        let dir = tempfile::tempdir().unwrap();
        write_identity(
            dir.path(),
            "admin",
            json!({
                "credentials": { "certificate": TEST_CERT, "privateKey": "secret" },
                "mspId": "Org1MSP",
                "type": "X.509",
                "version": 1
            }),
        );

        let wallet = IdentityWallet::new(dir.path());
        let identity = wallet.get("admin").unwrap();
        assert_eq!(identity.msp_id, "Org1MSP");
        assert!(identity.certificate.starts_with("-----BEGIN CERTIFICATE-----"));
        assert_eq!(wallet.list().unwrap(), vec!["admin"]);
    }

    #[test]
    fn missing_identity() {
        let dir = tempfile::tempdir().unwrap();
        let err = IdentityWallet::new(dir.path()).get("nobody").unwrap_err();
        assert!(matches!(err, IdentityError::NotFound { .. }));
    }

    #[test]
    fn rejects_non_certificate_pem() {
        let dir = tempfile::tempdir().unwrap();
        write_identity(
            dir.path(),
            "bad",
            json!({
                "credentials": { "certificate": "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n" },
                "mspId": "Org1MSP"
            }),
        );
        let err = IdentityWallet::new(dir.path()).get("bad").unwrap_err();
        assert!(matches!(err, IdentityError::InvalidCertificate { .. }));
    }

    #[test]
    fn rejects_unsupported_type() {
        let dir = tempfile::tempdir().unwrap();
        write_identity(
            dir.path(),
            "hsm",
            json!({
                "credentials": { "certificate": TEST_CERT },
                "mspId": "Org1MSP",
                "type": "HSM-X.509"
            }),
        );
        let err = IdentityWallet::new(dir.path()).get("hsm").unwrap_err();
        assert!(matches!(err, IdentityError::UnsupportedType { .. }));
    }

    #[test]
    fn list_of_missing_wallet_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = IdentityWallet::new(dir.path().join("absent"));
        assert!(wallet.list().unwrap().is_empty());
    }
}
