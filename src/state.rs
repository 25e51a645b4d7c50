// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::storage::ReplicaStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ReplicaStore>,
}

impl AppState {
    pub fn new(store: Arc<ReplicaStore>) -> Self {
        Self { store }
    }
}
