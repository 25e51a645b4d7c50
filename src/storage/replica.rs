// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded replica store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: username → serialized User
//! - `products`: product id → serialized Product
//! - `agreements`: txID → serialized Agreement
//! - `inventory`: product id → serialized InventoryEntry
//! - `product_owner_index`: composite key (owner \0 product_id) → product_id
//! - `inventory_owner_index`: same key shape, for inventory entries
//!
//! Every write is one redb transaction over one document (plus its owner
//! index entry). Cascades run several of them in a fixed order and are not
//! atomic as a whole; each step is idempotent, so re-applying the event that
//! triggered a partial cascade finishes it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::query::{FindOptions, Page};
use crate::models::{Agreement, InventoryEntry, Product, User};

// =============================================================================
// Table Definitions
// =============================================================================

type DocTable = TableDefinition<'static, &'static str, &'static [u8]>;

const USERS: DocTable = TableDefinition::new("users");
const PRODUCTS: DocTable = TableDefinition::new("products");
const AGREEMENTS: DocTable = TableDefinition::new("agreements");
const INVENTORY: DocTable = TableDefinition::new("inventory");

type OwnerIndex = TableDefinition<'static, &'static [u8], &'static str>;

/// Index: `owner \0 product_id` → product_id, for owner range scans.
const PRODUCT_OWNER_INDEX: OwnerIndex = TableDefinition::new("product_owner_index");

/// Index: `owner \0 product_id` → product_id over inventory entries.
const INVENTORY_OWNER_INDEX: OwnerIndex = TableDefinition::new("inventory_owner_index");

/// Replica collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Products,
    Agreements,
    Inventory,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Products,
        Collection::Agreements,
        Collection::Inventory,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Products => "products",
            Collection::Agreements => "agreements",
            Collection::Inventory => "inventory",
        }
    }

    fn table(self) -> DocTable {
        match self {
            Collection::Users => USERS,
            Collection::Products => PRODUCTS,
            Collection::Agreements => AGREEMENTS,
            Collection::Inventory => INVENTORY,
        }
    }
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("replica store is not connected")]
    NotConnected,

    #[error("failed to create replica directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open replica store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: redb::DatabaseError,
    },

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Observable effect of a single store write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Upsert created a new document.
    Inserted,
    /// Upsert or update replaced an existing document with different content.
    Replaced,
    /// The stored document already had exactly this content.
    Unchanged,
    /// Update target does not exist; nothing written.
    Missing,
    /// Delete removed a document.
    Deleted,
    /// Delete target does not exist; nothing removed.
    Absent,
}

impl WriteOutcome {
    /// Whether the write changed stored state.
    pub fn changed(self) -> bool {
        matches!(
            self,
            WriteOutcome::Inserted | WriteOutcome::Replaced | WriteOutcome::Deleted
        )
    }
}

// =============================================================================
// Index Key Helpers
// =============================================================================

fn make_owner_key(owner: &str, product_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(owner.len() + 1 + product_id.len());
    key.extend_from_slice(owner.as_bytes());
    key.push(0);
    key.extend_from_slice(product_id.as_bytes());
    key
}

fn make_owner_prefix(owner: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(owner.len() + 1);
    prefix.extend_from_slice(owner.as_bytes());
    prefix.push(0);
    prefix
}

/// Exclusive upper bound: the separator byte bumped by one.
fn make_owner_prefix_end(owner: &str) -> Vec<u8> {
    let mut end = Vec::with_capacity(owner.len() + 1);
    end.extend_from_slice(owner.as_bytes());
    end.push(1);
    end
}

// =============================================================================
// ReplicaStore
// =============================================================================

/// Connection-scoped handle on the replica database.
///
/// Cheap to share behind an `Arc`; every operation takes a snapshot of the
/// current connection, so `disconnect` never invalidates an in-flight call.
pub struct ReplicaStore {
    path: PathBuf,
    db: RwLock<Option<Arc<Database>>>,
}

impl ReplicaStore {
    /// Create a disconnected handle for the database at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            db: RwLock::new(None),
        }
    }

    /// Create a handle and connect it.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let store = Self::new(path);
        store.connect()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open (or create) the database. Connecting twice is a no-op.
    ///
    /// On failure the half-opened database is dropped and the handle stays
    /// disconnected.
    pub fn connect(&self) -> StoreResult<()> {
        let mut guard = self.db.write().unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let db = Database::create(&self.path).map_err(|source| StoreError::Open {
            path: self.path.clone(),
            source,
        })?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(PRODUCTS)?;
            let _ = write_txn.open_table(AGREEMENTS)?;
            let _ = write_txn.open_table(INVENTORY)?;
            let _ = write_txn.open_table(PRODUCT_OWNER_INDEX)?;
            let _ = write_txn.open_table(INVENTORY_OWNER_INDEX)?;
        }
        write_txn.commit()?;

        *guard = Some(Arc::new(db));
        tracing::info!(path = %self.path.display(), "Replica store connected");
        Ok(())
    }

    /// Release the database. Idempotent.
    pub fn disconnect(&self) {
        let mut guard = self.db.write().unwrap_or_else(|e| e.into_inner());
        if guard.take().is_some() {
            tracing::info!(path = %self.path.display(), "Replica store disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.db
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn db(&self) -> StoreResult<Arc<Database>> {
        self.db
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(StoreError::NotConnected)
    }

    // =========================================================================
    // Generic document operations
    // =========================================================================

    fn put_json<T: Serialize>(&self, table: DocTable, key: &str, doc: &T) -> StoreResult<WriteOutcome> {
        let db = self.db()?;
        let json = serde_json::to_vec(doc)?;

        let write_txn = db.begin_write()?;
        let outcome = {
            let mut t = write_txn.open_table(table)?;
            let previous = t.get(key)?.map(|v| v.value().to_vec());
            match previous {
                Some(bytes) if bytes == json => WriteOutcome::Unchanged,
                previous => {
                    t.insert(key, json.as_slice())?;
                    if previous.is_some() {
                        WriteOutcome::Replaced
                    } else {
                        WriteOutcome::Inserted
                    }
                }
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    fn replace_json<T: Serialize>(&self, table: DocTable, key: &str, doc: &T) -> StoreResult<WriteOutcome> {
        let db = self.db()?;
        let json = serde_json::to_vec(doc)?;

        let write_txn = db.begin_write()?;
        let outcome = {
            let mut t = write_txn.open_table(table)?;
            let previous = t.get(key)?.map(|v| v.value().to_vec());
            match previous {
                None => WriteOutcome::Missing,
                Some(bytes) if bytes == json => WriteOutcome::Unchanged,
                Some(_) => {
                    t.insert(key, json.as_slice())?;
                    WriteOutcome::Replaced
                }
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    fn remove(&self, table: DocTable, key: &str) -> StoreResult<WriteOutcome> {
        let db = self.db()?;
        let write_txn = db.begin_write()?;
        let removed = {
            let mut t = write_txn.open_table(table)?;
            let removed = t.remove(key)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(if removed {
            WriteOutcome::Deleted
        } else {
            WriteOutcome::Absent
        })
    }

    fn get_json<T: DeserializeOwned>(&self, table: DocTable, key: &str) -> StoreResult<Option<T>> {
        let db = self.db()?;
        let read_txn = db.begin_read()?;
        let t = read_txn.open_table(table)?;
        match t.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn scan(&self, table: DocTable) -> StoreResult<Vec<(String, Value)>> {
        let db = self.db()?;
        let read_txn = db.begin_read()?;
        let t = read_txn.open_table(table)?;

        let mut docs = Vec::new();
        for entry in t.iter()? {
            let entry = entry?;
            let key = entry.0.value().to_string();
            let doc: Value = serde_json::from_slice(entry.1.value())?;
            docs.push((key, doc));
        }
        Ok(docs)
    }

    fn scan_typed<T: DeserializeOwned>(&self, table: DocTable) -> StoreResult<Vec<T>> {
        self.scan(table)?
            .into_iter()
            .map(|(_, doc)| serde_json::from_value(doc).map_err(StoreError::from))
            .collect()
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub fn upsert_user(&self, user: &User) -> StoreResult<WriteOutcome> {
        self.put_json(USERS, &user.username, user)
    }

    pub fn update_user(&self, user: &User) -> StoreResult<WriteOutcome> {
        self.replace_json(USERS, &user.username, user)
    }

    /// Delete a user and everything it owns.
    ///
    /// Order: each owned product (inventory entry first, then product), the
    /// user document, then any inventory entries still naming the user.
    pub fn delete_user(&self, username: &str) -> StoreResult<WriteOutcome> {
        let owned = self.product_ids_by_owner(username)?;
        for product_id in &owned {
            self.delete_product(product_id)?;
        }

        let outcome = self.remove(USERS, username)?;
        let swept = self.delete_inventory_by_owner(username)?;

        tracing::debug!(
            username,
            products = owned.len(),
            stray_inventory = swept,
            outcome = ?outcome,
            "User cascade applied"
        );
        Ok(outcome)
    }

    pub fn get_user(&self, username: &str) -> StoreResult<Option<User>> {
        self.get_json(USERS, username)
    }

    pub fn all_users(&self) -> StoreResult<Vec<User>> {
        self.scan_typed(USERS)
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Write a product (and its owner index entry), then its inventory entry.
    pub fn upsert_product(&self, product: &Product) -> StoreResult<WriteOutcome> {
        let outcome = self.write_product(product, false)?;
        self.put_inventory(&InventoryEntry::from(product))?;
        Ok(outcome)
    }

    /// Replace an existing product. The inventory entry follows an owner
    /// change. Absent products are left absent.
    pub fn update_product(&self, product: &Product) -> StoreResult<WriteOutcome> {
        let outcome = self.write_product(product, true)?;
        if outcome != WriteOutcome::Missing {
            self.put_inventory(&InventoryEntry::from(product))?;
        }
        Ok(outcome)
    }

    fn write_product(&self, product: &Product, existing_only: bool) -> StoreResult<WriteOutcome> {
        let db = self.db()?;
        let json = serde_json::to_vec(product)?;

        let write_txn = db.begin_write()?;
        let outcome = {
            let mut products = write_txn.open_table(PRODUCTS)?;
            let mut index = write_txn.open_table(PRODUCT_OWNER_INDEX)?;

            let previous = products.get(product.id.as_str())?.map(|v| v.value().to_vec());
            match previous {
                None if existing_only => WriteOutcome::Missing,
                Some(bytes) if bytes == json => WriteOutcome::Unchanged,
                previous => {
                    if let Some(bytes) = &previous {
                        let old: Product = serde_json::from_slice(bytes)?;
                        if old.owner != product.owner {
                            index.remove(make_owner_key(&old.owner, &old.id).as_slice())?;
                        }
                    }
                    products.insert(product.id.as_str(), json.as_slice())?;
                    let key = make_owner_key(&product.owner, &product.id);
                    index.insert(key.as_slice(), product.id.as_str())?;

                    if previous.is_some() {
                        WriteOutcome::Replaced
                    } else {
                        WriteOutcome::Inserted
                    }
                }
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    /// Delete a product: inventory entry first, then the product.
    pub fn delete_product(&self, product_id: &str) -> StoreResult<WriteOutcome> {
        self.remove_inventory(product_id)?;

        let db = self.db()?;
        let write_txn = db.begin_write()?;
        let removed = {
            let mut products = write_txn.open_table(PRODUCTS)?;
            let mut index = write_txn.open_table(PRODUCT_OWNER_INDEX)?;

            let previous = products.remove(product_id)?.map(|v| v.value().to_vec());
            match previous {
                Some(bytes) => {
                    let old: Product = serde_json::from_slice(&bytes)?;
                    index.remove(make_owner_key(&old.owner, &old.id).as_slice())?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;

        Ok(if removed {
            WriteOutcome::Deleted
        } else {
            WriteOutcome::Absent
        })
    }

    pub fn get_product(&self, product_id: &str) -> StoreResult<Option<Product>> {
        self.get_json(PRODUCTS, product_id)
    }

    pub fn all_products(&self) -> StoreResult<Vec<Product>> {
        self.scan_typed(PRODUCTS)
    }

    /// Ids of the products owned by `owner`, via the owner index.
    pub fn product_ids_by_owner(&self, owner: &str) -> StoreResult<Vec<String>> {
        self.ids_by_owner(PRODUCT_OWNER_INDEX, owner)
    }

    fn ids_by_owner(&self, table: OwnerIndex, owner: &str) -> StoreResult<Vec<String>> {
        let db = self.db()?;
        let read_txn = db.begin_read()?;
        let index = read_txn.open_table(table)?;

        let prefix = make_owner_prefix(owner);
        let prefix_end = make_owner_prefix_end(owner);

        let mut ids = Vec::new();
        for entry in index.range(prefix.as_slice()..prefix_end.as_slice())? {
            let entry = entry?;
            ids.push(entry.1.value().to_string());
        }
        Ok(ids)
    }

    pub fn products_by_owner(&self, owner: &str) -> StoreResult<Vec<Product>> {
        let mut products = Vec::new();
        for id in self.product_ids_by_owner(owner)? {
            if let Some(product) = self.get_product(&id)? {
                products.push(product);
            }
        }
        Ok(products)
    }

    // =========================================================================
    // Agreements
    // =========================================================================

    pub fn upsert_agreement(&self, agreement: &Agreement) -> StoreResult<WriteOutcome> {
        self.put_json(AGREEMENTS, &agreement.tx_id, agreement)
    }

    pub fn update_agreement(&self, agreement: &Agreement) -> StoreResult<WriteOutcome> {
        self.replace_json(AGREEMENTS, &agreement.tx_id, agreement)
    }

    pub fn get_agreement(&self, tx_id: &str) -> StoreResult<Option<Agreement>> {
        self.get_json(AGREEMENTS, tx_id)
    }

    pub fn all_agreements(&self) -> StoreResult<Vec<Agreement>> {
        self.scan_typed(AGREEMENTS)
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    pub fn get_inventory(&self, product_id: &str) -> StoreResult<Option<InventoryEntry>> {
        self.get_json(INVENTORY, product_id)
    }

    pub fn all_inventory(&self) -> StoreResult<Vec<InventoryEntry>> {
        self.scan_typed(INVENTORY)
    }

    /// Remove every inventory entry naming `owner`, via the inventory owner
    /// index. Returns how many went.
    pub fn delete_inventory_by_owner(&self, owner: &str) -> StoreResult<usize> {
        let stale = self.ids_by_owner(INVENTORY_OWNER_INDEX, owner)?;
        for product_id in &stale {
            self.remove_inventory(product_id)?;
        }
        Ok(stale.len())
    }

    /// Write an inventory entry and move its owner index key along with it.
    fn put_inventory(&self, entry: &InventoryEntry) -> StoreResult<WriteOutcome> {
        let db = self.db()?;
        let json = serde_json::to_vec(entry)?;

        let write_txn = db.begin_write()?;
        let outcome = {
            let mut inventory = write_txn.open_table(INVENTORY)?;
            let mut index = write_txn.open_table(INVENTORY_OWNER_INDEX)?;

            let previous = inventory.get(entry.product_id.as_str())?.map(|v| v.value().to_vec());
            match previous {
                Some(bytes) if bytes == json => WriteOutcome::Unchanged,
                previous => {
                    if let Some(bytes) = &previous {
                        let old: InventoryEntry = serde_json::from_slice(bytes)?;
                        index.remove(make_owner_key(&old.owner, &old.product_id).as_slice())?;
                    }
                    inventory.insert(entry.product_id.as_str(), json.as_slice())?;
                    let key = make_owner_key(&entry.owner, &entry.product_id);
                    index.insert(key.as_slice(), entry.product_id.as_str())?;

                    if previous.is_some() {
                        WriteOutcome::Replaced
                    } else {
                        WriteOutcome::Inserted
                    }
                }
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    fn remove_inventory(&self, product_id: &str) -> StoreResult<WriteOutcome> {
        let db = self.db()?;
        let write_txn = db.begin_write()?;
        let removed = {
            let mut inventory = write_txn.open_table(INVENTORY)?;
            let mut index = write_txn.open_table(INVENTORY_OWNER_INDEX)?;

            let previous = inventory.remove(product_id)?.map(|v| v.value().to_vec());
            match previous {
                Some(bytes) => {
                    let old: InventoryEntry = serde_json::from_slice(&bytes)?;
                    index.remove(make_owner_key(&old.owner, &old.product_id).as_slice())?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;

        Ok(if removed {
            WriteOutcome::Deleted
        } else {
            WriteOutcome::Absent
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Filtered, sorted, paginated read of one collection.
    pub fn find<T: DeserializeOwned>(
        &self,
        collection: Collection,
        options: &FindOptions,
    ) -> StoreResult<Page<T>> {
        let docs = self.scan(collection.table())?;
        options
            .paginate(docs)
            .try_map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
    }

    /// Raw JSON document by natural key.
    pub fn get_document(&self, collection: Collection, key: &str) -> StoreResult<Option<Value>> {
        self.get_json(collection.table(), key)
    }

    pub fn count(&self, collection: Collection) -> StoreResult<usize> {
        let db = self.db()?;
        let read_txn = db.begin_read()?;
        let t = read_txn.open_table(collection.table())?;
        let mut count = 0;
        for entry in t.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Remove all replicated data and recreate empty tables.
    pub fn drop_all(&self) -> StoreResult<()> {
        let db = self.db()?;
        let write_txn = db.begin_write()?;
        for collection in Collection::ALL {
            write_txn.delete_table(collection.table())?;
            let _ = write_txn.open_table(collection.table())?;
        }
        for index in [PRODUCT_OWNER_INDEX, INVENTORY_OWNER_INDEX] {
            write_txn.delete_table(index)?;
            let _ = write_txn.open_table(index)?;
        }
        write_txn.commit()?;

        tracing::warn!(path = %self.path.display(), "Replica store dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::query::{Filter, Sort};
    use serde_json::json;

    fn temp_store() -> (tempfile::TempDir, ReplicaStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ReplicaStore::open(dir.path().join("replica.redb")).unwrap();
        (dir, store)
    }

    fn user(name: &str) -> User {
        serde_json::from_value(json!({ "username": name, "isOrg": false })).unwrap()
    }

    fn product(id: &str, owner: &str, price: f64) -> Product {
        serde_json::from_value(json!({
            "id": id,
            "owner": owner,
            "price": price,
            "timestamp": price as i64,
        }))
        .unwrap()
    }

    #[test]
    fn operations_fail_when_disconnected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReplicaStore::new(dir.path().join("replica.redb"));
        assert!(matches!(store.get_user("x"), Err(StoreError::NotConnected)));

        store.connect().unwrap();
        store.connect().unwrap();
        assert!(store.is_connected());

        store.disconnect();
        store.disconnect();
        assert!(matches!(store.upsert_user(&user("x")), Err(StoreError::NotConnected)));
    }

    #[test]
    fn connect_failure_leaves_handle_disconnected() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file
        let store = ReplicaStore::new(dir.path());
        assert!(matches!(store.connect(), Err(StoreError::Open { .. })));
        assert!(!store.is_connected());
    }

    #[test]
    fn unusable_parent_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let store = ReplicaStore::new(blocker.join("data").join("replica.redb"));
        match store.connect() {
            Err(StoreError::CreateDir { path, .. }) => assert_eq!(path, blocker.join("data")),
            other => panic!("expected CreateDir, got {other:?}"),
        }
        assert!(!store.is_connected());
    }

    #[test]
    fn connect_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReplicaStore::open(dir.path().join("a").join("b").join("replica.redb")).unwrap();
        assert!(store.is_connected());
    }

    #[test]
    fn upsert_is_idempotent() {
        let (_dir, store) = temp_store();
        let u = user("alice");
        assert_eq!(store.upsert_user(&u).unwrap(), WriteOutcome::Inserted);
        assert_eq!(store.upsert_user(&u).unwrap(), WriteOutcome::Unchanged);
        assert_eq!(store.count(Collection::Users).unwrap(), 1);
    }

    #[test]
    fn update_of_absent_document_is_noop() {
        let (_dir, store) = temp_store();
        assert_eq!(store.update_user(&user("ghost")).unwrap(), WriteOutcome::Missing);
        assert_eq!(store.update_product(&product("p", "ghost", 1.0)).unwrap(), WriteOutcome::Missing);
        assert!(store.get_user("ghost").unwrap().is_none());
        assert!(store.get_inventory("p").unwrap().is_none());
    }

    #[test]
    fn product_writes_maintain_inventory() {
        let (_dir, store) = temp_store();
        store.upsert_product(&product("p1", "seller", 10.0)).unwrap();
        assert_eq!(store.get_inventory("p1").unwrap().unwrap().owner, "seller");
        assert_eq!(store.product_ids_by_owner("seller").unwrap(), vec!["p1"]);

        store.update_product(&product("p1", "buyer", 10.0)).unwrap();
        assert_eq!(store.get_inventory("p1").unwrap().unwrap().owner, "buyer");
        assert!(store.product_ids_by_owner("seller").unwrap().is_empty());
        assert_eq!(store.product_ids_by_owner("buyer").unwrap(), vec!["p1"]);

        assert_eq!(store.delete_product("p1").unwrap(), WriteOutcome::Deleted);
        assert_eq!(store.delete_product("p1").unwrap(), WriteOutcome::Absent);
        assert!(store.get_inventory("p1").unwrap().is_none());
        assert!(store.product_ids_by_owner("buyer").unwrap().is_empty());
    }

    #[test]
    fn owner_index_does_not_leak_across_prefixes() {
        let (_dir, store) = temp_store();
        store.upsert_product(&product("p1", "ann", 1.0)).unwrap();
        store.upsert_product(&product("p2", "anna", 1.0)).unwrap();
        assert_eq!(store.product_ids_by_owner("ann").unwrap(), vec!["p1"]);
    }

    #[test]
    fn delete_user_cascades() {
        let (_dir, store) = temp_store();
        store.upsert_user(&user("seller")).unwrap();
        store.upsert_user(&user("other")).unwrap();
        store.upsert_product(&product("p1", "seller", 1.0)).unwrap();
        store.upsert_product(&product("p2", "seller", 2.0)).unwrap();
        store.upsert_product(&product("p3", "other", 3.0)).unwrap();
        store
            .put_inventory(&InventoryEntry { product_id: "orphan".into(), owner: "seller".into() })
            .unwrap();

        assert_eq!(store.delete_user("seller").unwrap(), WriteOutcome::Deleted);

        assert!(store.get_user("seller").unwrap().is_none());
        assert!(store.products_by_owner("seller").unwrap().is_empty());
        assert!(store.all_inventory().unwrap().iter().all(|e| e.owner != "seller"));
        assert_eq!(store.count(Collection::Products).unwrap(), 1);
        assert_eq!(store.count(Collection::Inventory).unwrap(), 1);
    }

    #[test]
    fn inventory_owner_index_follows_ownership() {
        let (_dir, store) = temp_store();
        store.upsert_product(&product("p1", "seller", 1.0)).unwrap();
        store.upsert_product(&product("p2", "seller", 2.0)).unwrap();
        store.update_product(&product("p2", "buyer", 2.0)).unwrap();

        assert_eq!(store.ids_by_owner(INVENTORY_OWNER_INDEX, "seller").unwrap(), vec!["p1"]);
        assert_eq!(store.ids_by_owner(INVENTORY_OWNER_INDEX, "buyer").unwrap(), vec!["p2"]);

        // Only the indexed entries go; the other owner's entry stays
        assert_eq!(store.delete_inventory_by_owner("seller").unwrap(), 1);
        assert!(store.get_inventory("p1").unwrap().is_none());
        assert!(store.get_inventory("p2").unwrap().is_some());
        assert_eq!(store.delete_inventory_by_owner("seller").unwrap(), 0);

        store.delete_product("p2").unwrap();
        assert!(store.ids_by_owner(INVENTORY_OWNER_INDEX, "buyer").unwrap().is_empty());
    }

    #[test]
    fn find_filters_sorts_and_pages() {
        let (_dir, store) = temp_store();
        for (i, owner) in ["a", "b", "a", "a"].iter().enumerate() {
            store
                .upsert_product(&product(&format!("p{i}"), owner, i as f64))
                .unwrap();
        }

        let page: Page<Product> = store
            .find(
                Collection::Products,
                &FindOptions::default()
                    .with_filter(Filter::new().eq("owner", "a"))
                    .with_page(1, 2),
            )
            .unwrap();
        assert_eq!(page.total, 3);
        let ids: Vec<_> = page.items.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p2"]);

        let page: Page<Product> = store
            .find(Collection::Products, &FindOptions::default().with_sort(Sort::asc("price")))
            .unwrap();
        assert_eq!(page.items[0].id, "p0");
    }

    #[test]
    fn drop_all_empties_every_collection() {
        let (_dir, store) = temp_store();
        store.upsert_user(&user("u")).unwrap();
        store.upsert_product(&product("p", "u", 1.0)).unwrap();
        store.drop_all().unwrap();
        for collection in Collection::ALL {
            assert_eq!(store.count(collection).unwrap(), 0);
        }
        assert!(store.product_ids_by_owner("u").unwrap().is_empty());
        assert!(store.ids_by_owner(INVENTORY_OWNER_INDEX, "u").unwrap().is_empty());
    }
}
