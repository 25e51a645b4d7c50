// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Consistency Validator
//!
//! Cross-checks the replica against the ledger, collection by collection:
//! record counts first, then each authoritative record by natural key, then
//! the fields that record carries. The first divergence found is reported.
//!
//! [`ValidationLoop`] repeats the check on a fixed interval and only logs the
//! outcome of each cycle.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::compare::first_divergence;
use crate::ledger::contracts::ContractGateway;
use crate::ledger::gateway::GatewayError;
use crate::storage::replica::{Collection, ReplicaStore, StoreError};

pub const DEFAULT_VALIDATE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{collection}: ledger has {ledger} records, replica has {replica}")]
    CountMismatch {
        collection: &'static str,
        ledger: usize,
        replica: usize,
    },

    #[error("{collection}: record {key} is missing from the replica")]
    MissingRecord { collection: &'static str, key: String },

    #[error("{collection}: record {key} differs at field `{field}`")]
    FieldMismatch {
        collection: &'static str,
        key: String,
        field: String,
    },

    #[error("{collection}: ledger record #{index} has no `{key_field}`")]
    InvalidRecord {
        collection: &'static str,
        index: usize,
        key_field: &'static str,
    },

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("replica store error: {0}")]
    Store(#[from] StoreError),
}

impl ValidationError {
    /// True for findings about the data, false for failures to look.
    pub fn is_divergence(&self) -> bool {
        matches!(
            self,
            ValidationError::CountMismatch { .. }
                | ValidationError::MissingRecord { .. }
                | ValidationError::FieldMismatch { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionCheck {
    pub collection: &'static str,
    pub records: usize,
}

/// Collections that matched, in the order they were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub checked: Vec<CollectionCheck>,
}

impl ValidationReport {
    pub fn total_records(&self) -> usize {
        self.checked.iter().map(|c| c.records).sum()
    }
}

fn key_field(collection: Collection) -> &'static str {
    match collection {
        Collection::Users => "username",
        Collection::Products | Collection::Inventory => "id",
        Collection::Agreements => "txID",
    }
}

pub struct ConsistencyValidator {
    store: Arc<ReplicaStore>,
    include_agreements: bool,
}

impl ConsistencyValidator {
    pub fn new(store: Arc<ReplicaStore>) -> Self {
        Self {
            store,
            include_agreements: true,
        }
    }

    pub fn with_agreements(mut self, include: bool) -> Self {
        self.include_agreements = include;
        self
    }

    fn collections(&self) -> Vec<Collection> {
        let mut collections = vec![Collection::Users, Collection::Products];
        if self.include_agreements {
            collections.push(Collection::Agreements);
        }
        collections
    }

    /// Run one full comparison.
    pub async fn validate(&self, contracts: &ContractGateway<'_>) -> Result<ValidationReport, ValidationError> {
        let mut report = ValidationReport::default();

        for collection in self.collections() {
            let authoritative = match collection {
                Collection::Users => contracts.all_users().await?,
                Collection::Products => contracts.all_products().await?,
                Collection::Agreements => contracts.all_agreements().await?,
                Collection::Inventory => continue,
            };
            let records = self.check_collection(collection, &authoritative)?;
            report.checked.push(CollectionCheck {
                collection: collection.name(),
                records,
            });
        }

        Ok(report)
    }

    fn check_collection(&self, collection: Collection, authoritative: &[Value]) -> Result<usize, ValidationError> {
        let name = collection.name();

        let replica_count = self.store.count(collection)?;
        if authoritative.len() != replica_count {
            return Err(ValidationError::CountMismatch {
                collection: name,
                ledger: authoritative.len(),
                replica: replica_count,
            });
        }

        let key_field = key_field(collection);
        for (index, record) in authoritative.iter().enumerate() {
            let key = record
                .get(key_field)
                .and_then(Value::as_str)
                .filter(|k| !k.is_empty())
                .ok_or(ValidationError::InvalidRecord {
                    collection: name,
                    index,
                    key_field,
                })?;

            let Some(replica) = self.store.get_document(collection, key)? else {
                return Err(ValidationError::MissingRecord {
                    collection: name,
                    key: key.to_string(),
                });
            };

            if let Some(field) = first_divergence(record, &replica) {
                return Err(ValidationError::FieldMismatch {
                    collection: name,
                    key: key.to_string(),
                    field,
                });
            }
        }

        tracing::debug!(collection = name, records = authoritative.len(), "Collection matches");
        Ok(authoritative.len())
    }
}

/// Why a [`ValidationLoop`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Shutdown,
    /// `max_failures` consecutive cycles failed.
    FailureLimit { consecutive: u32 },
}

/// Repeats validation on a fixed interval until shutdown.
pub struct ValidationLoop {
    validator: ConsistencyValidator,
    interval: Duration,
    /// 0 keeps going forever.
    max_failures: u32,
}

impl ValidationLoop {
    pub fn new(validator: ConsistencyValidator) -> Self {
        Self {
            validator,
            interval: DEFAULT_VALIDATE_INTERVAL,
            max_failures: 0,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    /// Never returns an error. Every cycle is logged, divergent or not.
    pub async fn run(&self, contracts: &ContractGateway<'_>, shutdown: CancellationToken) -> LoopExit {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            max_failures = self.max_failures,
            "Continuous validation starting"
        );

        let mut cycle: u64 = 0;
        let mut consecutive: u32 = 0;

        loop {
            if shutdown.is_cancelled() {
                tracing::info!(cycles = cycle, "Continuous validation shutting down");
                return LoopExit::Shutdown;
            }

            cycle += 1;
            match self.validator.validate(contracts).await {
                Ok(report) => {
                    consecutive = 0;
                    tracing::info!(cycle, records = report.total_records(), "Replica is consistent");
                }
                Err(e) => {
                    consecutive += 1;
                    if e.is_divergence() {
                        tracing::warn!(cycle, consecutive, error = %e, "Replica diverges from ledger");
                    } else {
                        tracing::warn!(cycle, consecutive, error = %e, "Validation cycle failed");
                    }

                    if self.max_failures > 0 && consecutive >= self.max_failures {
                        tracing::error!(consecutive, "Too many failed validation cycles, stopping");
                        return LoopExit::FailureLimit { consecutive };
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    tracing::info!(cycles = cycle, "Continuous validation shutting down");
                    return LoopExit::Shutdown;
                }
            }
        }
    }
}
