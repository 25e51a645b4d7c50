// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Every setting comes from the environment (a `.env` file is loaded first
//! when present) and can be overridden by the matching command-line flag.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `FABRIC_GATEWAY_URL` | REST gateway sidecar base URL | Required for ledger commands |
//! | `FABRIC_CHANNEL_ID` | Channel name | Required for ledger commands |
//! | `FABRIC_CHAINCODE_ID` | Chaincode name | Required for ledger commands |
//! | `FABRIC_WALLET_PATH` | Identity wallet directory | `./wallet` |
//! | `FABRIC_IDENTITY` | Wallet identity to act as | `admin` |
//! | `FABRIC_REPLICA_PATH` | Replica database file | `./data/replica.redb` |
//! | `FABRIC_CHECKPOINT_PATH` | Listener checkpoint file | `./data/next_block` |
//! | `FABRIC_EVALUATE_TIMEOUT_MS` | Evaluate deadline | `5000` |
//! | `FABRIC_ENDORSE_TIMEOUT_MS` | Endorse deadline | `15000` |
//! | `FABRIC_SUBMIT_TIMEOUT_MS` | Submit deadline | `5000` |
//! | `FABRIC_COMMIT_TIMEOUT_MS` | Commit-status deadline | `60000` |
//! | `FABRIC_COMMIT_SIGNING` | Require the commit-signing round | `true` |
//! | `VALIDATE_INTERVAL_SECS` | Continuous validation interval | `5` |
//! | `VALIDATE_MAX_FAILURES` | Stop after N consecutive failed cycles (0 = never) | `0` |
//! | `VALIDATE_AGREEMENTS` | Also validate agreements | `true` |
//! | `HOST` | Query API bind address | `0.0.0.0` |
//! | `PORT` | Query API bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args};
use url::Url;

use crate::ledger::{GatewayError, GatewayTimeouts, IdentityError, IdentityWallet, RestConnector};
use crate::signing::CommitSigning;

pub const GATEWAY_URL_ENV: &str = "FABRIC_GATEWAY_URL";
pub const CHANNEL_ENV: &str = "FABRIC_CHANNEL_ID";
pub const CHAINCODE_ENV: &str = "FABRIC_CHAINCODE_ID";
pub const WALLET_PATH_ENV: &str = "FABRIC_WALLET_PATH";
pub const IDENTITY_ENV: &str = "FABRIC_IDENTITY";
pub const REPLICA_PATH_ENV: &str = "FABRIC_REPLICA_PATH";
pub const CHECKPOINT_PATH_ENV: &str = "FABRIC_CHECKPOINT_PATH";
pub const EVALUATE_TIMEOUT_ENV: &str = "FABRIC_EVALUATE_TIMEOUT_MS";
pub const ENDORSE_TIMEOUT_ENV: &str = "FABRIC_ENDORSE_TIMEOUT_MS";
pub const SUBMIT_TIMEOUT_ENV: &str = "FABRIC_SUBMIT_TIMEOUT_MS";
pub const COMMIT_TIMEOUT_ENV: &str = "FABRIC_COMMIT_TIMEOUT_MS";
pub const COMMIT_SIGNING_ENV: &str = "FABRIC_COMMIT_SIGNING";
pub const VALIDATE_INTERVAL_ENV: &str = "VALIDATE_INTERVAL_SECS";
pub const VALIDATE_MAX_FAILURES_ENV: &str = "VALIDATE_MAX_FAILURES";
pub const VALIDATE_AGREEMENTS_ENV: &str = "VALIDATE_AGREEMENTS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("invalid bind address {0}")]
    BindAddress(String),
}

/// Where and as whom to reach the ledger.
#[derive(Debug, Clone, Args)]
pub struct LedgerArgs {
    /// REST gateway sidecar base URL
    #[arg(long, env = GATEWAY_URL_ENV)]
    pub gateway_url: Url,

    /// Channel name
    #[arg(long, env = CHANNEL_ENV)]
    pub channel: String,

    /// Chaincode name
    #[arg(long, env = CHAINCODE_ENV)]
    pub chaincode: String,

    /// Identity wallet directory
    #[arg(long, env = WALLET_PATH_ENV, default_value = "./wallet")]
    pub wallet: PathBuf,

    /// Wallet identity to act as
    #[arg(long, env = IDENTITY_ENV, default_value = "admin")]
    pub identity: String,

    #[arg(long, env = EVALUATE_TIMEOUT_ENV, default_value_t = 5_000)]
    pub evaluate_timeout_ms: u64,

    #[arg(long, env = ENDORSE_TIMEOUT_ENV, default_value_t = 15_000)]
    pub endorse_timeout_ms: u64,

    #[arg(long, env = SUBMIT_TIMEOUT_ENV, default_value_t = 5_000)]
    pub submit_timeout_ms: u64,

    #[arg(long, env = COMMIT_TIMEOUT_ENV, default_value_t = 60_000)]
    pub commit_timeout_ms: u64,
}

impl LedgerArgs {
    pub fn timeouts(&self) -> GatewayTimeouts {
        GatewayTimeouts {
            evaluate: Duration::from_millis(self.evaluate_timeout_ms),
            endorse: Duration::from_millis(self.endorse_timeout_ms),
            submit: Duration::from_millis(self.submit_timeout_ms),
            commit_status: Duration::from_millis(self.commit_timeout_ms),
        }
    }

    /// Load the configured identity and build a gateway connector for it.
    pub fn connector(&self) -> Result<RestConnector, ConfigError> {
        let identity = IdentityWallet::new(&self.wallet).get(&self.identity)?;
        tracing::info!(
            identity = %self.identity,
            msp_id = %identity.msp_id,
            gateway = %self.gateway_url,
            "Loaded ledger identity"
        );
        Ok(RestConnector::new(self.gateway_url.clone(), identity, self.timeouts())?)
    }
}

/// Local replica files.
#[derive(Debug, Clone, Args)]
pub struct StorageArgs {
    /// Replica database file
    #[arg(long, env = REPLICA_PATH_ENV, default_value = "./data/replica.redb")]
    pub replica_path: PathBuf,

    /// Listener checkpoint file
    #[arg(long, env = CHECKPOINT_PATH_ENV, default_value = "./data/next_block")]
    pub checkpoint_path: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    /// Keep validating on an interval until interrupted
    #[arg(long)]
    pub watch: bool,

    /// Seconds between validation cycles
    #[arg(long, env = VALIDATE_INTERVAL_ENV, default_value_t = 5)]
    pub interval_secs: u64,

    /// Stop after this many consecutive failed cycles (0 = never)
    #[arg(long, env = VALIDATE_MAX_FAILURES_ENV, default_value_t = 0)]
    pub max_failures: u32,

    /// Also validate the agreements collection
    #[arg(long, env = VALIDATE_AGREEMENTS_ENV, default_value_t = true, action = ArgAction::Set)]
    pub agreements: bool,
}

impl ValidateArgs {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Bind address
    #[arg(long, env = HOST_ENV, default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port
    #[arg(long, env = PORT_ENV, default_value_t = 8080)]
    pub port: u16,
}

impl ServeArgs {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::BindAddress(addr))
    }
}

#[derive(Debug, Clone, Args)]
pub struct SigningArgs {
    /// PEM private key (SEC1 or PKCS#8) used to sign each round
    #[arg(long)]
    pub key: PathBuf,

    /// Require the commit-signing round
    #[arg(long, env = COMMIT_SIGNING_ENV, default_value_t = true, action = ArgAction::Set)]
    pub commit_signing: bool,
}

impl SigningArgs {
    pub fn commit_signing(&self) -> CommitSigning {
        CommitSigning::from(self.commit_signing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_come_from_milliseconds() {
        let args = LedgerArgs {
            gateway_url: Url::parse("http://localhost:3000").unwrap(),
            channel: "mychannel".into(),
            chaincode: "marketplace".into(),
            wallet: PathBuf::from("./wallet"),
            identity: "admin".into(),
            evaluate_timeout_ms: 5_000,
            endorse_timeout_ms: 15_000,
            submit_timeout_ms: 5_000,
            commit_timeout_ms: 60_000,
        };
        assert_eq!(args.timeouts(), GatewayTimeouts::default());
    }

    #[test]
    fn connector_requires_wallet_identity() {
        let dir = tempfile::tempdir().unwrap();
        let args = LedgerArgs {
            gateway_url: Url::parse("http://localhost:3000").unwrap(),
            channel: "mychannel".into(),
            chaincode: "marketplace".into(),
            wallet: dir.path().to_path_buf(),
            identity: "nobody".into(),
            evaluate_timeout_ms: 1,
            endorse_timeout_ms: 1,
            submit_timeout_ms: 1,
            commit_timeout_ms: 1,
        };
        assert!(matches!(
            args.connector(),
            Err(ConfigError::Identity(IdentityError::NotFound { .. }))
        ));
    }

    #[test]
    fn bind_address_parses() {
        let serve = ServeArgs {
            host: "127.0.0.1".into(),
            port: 9000,
        };
        assert_eq!(serve.bind_addr().unwrap().port(), 9000);

        let bad = ServeArgs {
            host: "not a host".into(),
            port: 1,
        };
        assert!(matches!(bad.bind_addr(), Err(ConfigError::BindAddress(_))));
    }
}
