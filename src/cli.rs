// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Command-line surface.
//!
//! ```text
//! fabric-replica db listen              mirror chaincode events into the replica
//! fabric-replica db validate [--watch]  compare the replica against the ledger
//! fabric-replica db drop                wipe the replica (and its checkpoint)
//! fabric-replica api serve              read-only query API over the replica
//! fabric-replica tx submit              offline-signed transaction submission
//! ```

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::api;
use crate::config::{
    ConfigError, LedgerArgs, ServeArgs, SigningArgs, StorageArgs, ValidateArgs, LOG_FORMAT_ENV,
};
use crate::ledger::{ContractGateway, GatewayError, LedgerConnector};
use crate::replication::{
    BlockListener, ConsistencyValidator, ListenerError, LoopExit, ValidationError, ValidationLoop,
};
use crate::signing::{KeySigner, OfflineSigner, SignerError, SubmitError};
use crate::state::AppState;
use crate::storage::{CheckpointError, CheckpointFile, ReplicaStore, StoreError};
use crate::telemetry::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "fabric-replica", version)]
#[command(about = "Off-chain replica, validator and offline signer for a Fabric marketplace")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log output format
    #[arg(long, global = true, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replica database operations
    #[command(subcommand)]
    Db(DbCommand),

    /// Query API
    #[command(subcommand)]
    Api(ApiCommand),

    /// Transaction submission
    #[command(subcommand)]
    Tx(TxCommand),
}

#[derive(Debug, Subcommand)]
pub enum DbCommand {
    /// Follow the chaincode event stream from the stored checkpoint
    Listen {
        #[command(flatten)]
        ledger: LedgerArgs,
        #[command(flatten)]
        storage: StorageArgs,
    },

    /// Compare ledger state against the replica
    Validate {
        #[command(flatten)]
        ledger: LedgerArgs,
        #[command(flatten)]
        storage: StorageArgs,
        #[command(flatten)]
        validate: ValidateArgs,
    },

    /// Remove every replicated document
    Drop {
        #[command(flatten)]
        storage: StorageArgs,

        /// Leave the listener checkpoint in place
        #[arg(long)]
        keep_checkpoint: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ApiCommand {
    /// Serve the read-only query API
    Serve {
        #[command(flatten)]
        storage: StorageArgs,
        #[command(flatten)]
        serve: ServeArgs,
    },
}

#[derive(Debug, Subcommand)]
pub enum TxCommand {
    /// Build, sign and submit a transaction one round at a time
    Submit {
        #[command(flatten)]
        ledger: LedgerArgs,
        #[command(flatten)]
        signing: SigningArgs,

        /// Qualified chaincode function, e.g. DataContract:CreateProduct
        #[arg(long)]
        function: String,

        /// Function arguments
        args: Vec<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("replica is inconsistent: {0}")]
    Validation(#[from] ValidationError),

    #[error("validation stopped after {0} consecutive failed cycles")]
    ValidationAbandoned(u32),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("transaction {tx_id} was not committed (validation code {code})")]
    NotCommitted { tx_id: String, code: i32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn run(cli: Cli, shutdown: CancellationToken) -> Result<(), CliError> {
    match cli.command {
        Command::Db(DbCommand::Listen { ledger, storage }) => listen(&ledger, &storage, shutdown).await,
        Command::Db(DbCommand::Validate {
            ledger,
            storage,
            validate: options,
        }) => validate(&ledger, &storage, &options, shutdown).await,
        Command::Db(DbCommand::Drop {
            storage,
            keep_checkpoint,
        }) => drop_replica(&storage, keep_checkpoint),
        Command::Api(ApiCommand::Serve { storage, serve: options }) => serve(&storage, &options, shutdown).await,
        Command::Tx(TxCommand::Submit {
            ledger,
            signing,
            function,
            args,
        }) => submit(&ledger, &signing, &function, args).await,
    }
}

async fn listen(ledger: &LedgerArgs, storage: &StorageArgs, shutdown: CancellationToken) -> Result<(), CliError> {
    let store = Arc::new(ReplicaStore::open(&storage.replica_path)?);
    let connector = Arc::new(ledger.connector()?);

    let mut listener = BlockListener::new(
        connector,
        store.clone(),
        CheckpointFile::new(&storage.checkpoint_path),
    );
    listener.init(&ledger.channel, &ledger.chaincode).await?;

    // Failures after startup are logged by the listener and end the process normally
    if let Ok(stats) = listener.run(shutdown).await {
        tracing::info!(blocks = stats.blocks, applied = stats.applied, "Listener finished");
    }

    store.disconnect();
    Ok(())
}

async fn validate(
    ledger: &LedgerArgs,
    storage: &StorageArgs,
    options: &ValidateArgs,
    shutdown: CancellationToken,
) -> Result<(), CliError> {
    let store = Arc::new(ReplicaStore::open(&storage.replica_path)?);
    let connector = ledger.connector()?;
    let session = connector.connect(&ledger.channel, &ledger.chaincode).await?;
    let contracts = ContractGateway::new(session.as_ref());
    let validator = ConsistencyValidator::new(store.clone()).with_agreements(options.agreements);

    let result = if options.watch {
        let exit = ValidationLoop::new(validator)
            .with_interval(options.interval())
            .with_max_failures(options.max_failures)
            .run(&contracts, shutdown)
            .await;
        match exit {
            LoopExit::Shutdown => Ok(()),
            LoopExit::FailureLimit { consecutive } => Err(CliError::ValidationAbandoned(consecutive)),
        }
    } else {
        match validator.validate(&contracts).await {
            Ok(report) => {
                tracing::info!(records = report.total_records(), "Replica is consistent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    };

    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Failed to close gateway session");
    }
    store.disconnect();
    result
}

fn drop_replica(storage: &StorageArgs, keep_checkpoint: bool) -> Result<(), CliError> {
    let store = ReplicaStore::open(&storage.replica_path)?;
    store.drop_all()?;
    store.disconnect();

    if !keep_checkpoint {
        CheckpointFile::new(&storage.checkpoint_path).store(0)?;
        tracing::info!(path = %storage.checkpoint_path.display(), "Checkpoint reset");
    }
    Ok(())
}

async fn serve(storage: &StorageArgs, options: &ServeArgs, shutdown: CancellationToken) -> Result<(), CliError> {
    let store = Arc::new(ReplicaStore::open(&storage.replica_path)?);
    let addr = options.bind_addr()?;
    let app = api::router(AppState::new(store.clone()));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Replica query API listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    store.disconnect();
    Ok(())
}

async fn submit(
    ledger: &LedgerArgs,
    signing: &SigningArgs,
    function: &str,
    args: Vec<String>,
) -> Result<(), CliError> {
    let signer = KeySigner::from_pem_file(&signing.key)?;
    let connector = ledger.connector()?;
    let session = connector.connect(&ledger.channel, &ledger.chaincode).await?;

    let result = OfflineSigner::new(session.as_ref(), signing.commit_signing())
        .submit_tx(&signer, function, args)
        .await;
    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Failed to close gateway session");
    }

    let outcome = result?;
    if !outcome.status.successful {
        return Err(CliError::NotCommitted {
            tx_id: outcome.status.tx_id,
            code: outcome.status.code,
        });
    }
    println!("{}", String::from_utf8_lossy(&outcome.result));
    Ok(())
}
