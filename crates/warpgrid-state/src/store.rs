//! StateStore — redb-backed cluster state for WarpGrid scheduling.
//!
//! Provides typed operations over nodes, allocations, and jobs. All values
//! are JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

fn encode<T: Serialize>(value: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

/// Thread-safe state store backed by redb.
///
/// Readers never block each other, so a single store can back any number
/// of concurrent scheduling evaluations.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(ALLOCATIONS).map_err(map_err!(Table))?;
        txn.open_table(ALLOC_INDEX).map_err(map_err!(Table))?;
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(JOBS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Allocations ────────────────────────────────────────────────

    /// Insert or update an allocation.
    ///
    /// If the allocation previously lived on a different node, the stale
    /// record is removed so it only ever appears under one node.
    pub fn put_alloc(&self, alloc: &Allocation) -> StateResult<()> {
        let key = alloc.table_key();
        let value = encode(alloc)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut index = txn.open_table(ALLOC_INDEX).map_err(map_err!(Table))?;
            let previous = index
                .insert(alloc.id.as_str(), alloc.node_id.as_str())
                .map_err(map_err!(Write))?
                .map(|guard| guard.value().to_string());

            let mut table = txn.open_table(ALLOCATIONS).map_err(map_err!(Table))?;
            if let Some(old_node) = previous.filter(|n| *n != alloc.node_id) {
                table
                    .remove(alloc_key(&old_node, &alloc.id).as_str())
                    .map_err(map_err!(Write))?;
            }
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "allocation stored");
        Ok(())
    }

    /// Get an allocation by ID.
    pub fn get_alloc(&self, alloc_id: &str) -> StateResult<Option<Allocation>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let index = txn.open_table(ALLOC_INDEX).map_err(map_err!(Table))?;
        let Some(node_id) = index
            .get(alloc_id)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_string())
        else {
            return Ok(None);
        };

        let table = txn.open_table(ALLOCATIONS).map_err(map_err!(Table))?;
        let key = alloc_key(&node_id, alloc_id);
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Err(StateError::Inconsistent(format!(
                "index points allocation {alloc_id} at node {node_id} but no record exists"
            ))),
        }
    }

    /// Every allocation recorded against a node, regardless of status.
    ///
    /// Returns an empty list for unknown nodes. The key prefix also covers
    /// node IDs that extend `{node_id}/`, so records are matched on their
    /// own `node_id`.
    pub fn allocs_by_node(&self, node_id: &str) -> StateResult<Vec<Allocation>> {
        let prefix = alloc_key(node_id, "");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ALLOCATIONS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.range(prefix.as_str()..).map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            let alloc: Allocation = decode(value.value())?;
            if alloc.node_id == node_id {
                results.push(alloc);
            }
        }
        Ok(results)
    }

    /// Delete an allocation by ID. Returns true if it existed.
    pub fn delete_alloc(&self, alloc_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut index = txn.open_table(ALLOC_INDEX).map_err(map_err!(Table))?;
            let node_id = index
                .remove(alloc_id)
                .map_err(map_err!(Write))?
                .map(|guard| guard.value().to_string());
            existed = node_id.is_some();

            if let Some(node_id) = node_id {
                let mut table = txn.open_table(ALLOCATIONS).map_err(map_err!(Table))?;
                table
                    .remove(alloc_key(&node_id, alloc_id).as_str())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%alloc_id, existed, "allocation deleted");
        Ok(existed)
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Insert or update a node info.
    pub fn put_node(&self, node: &NodeInfo) -> StateResult<()> {
        let value = encode(node)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            table
                .insert(node.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a node by ID.
    pub fn get_node(&self, node_id: &str) -> StateResult<Option<NodeInfo>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        match table.get(node_id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all nodes.
    pub fn list_nodes(&self) -> StateResult<Vec<NodeInfo>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }

    /// Delete a node by ID. Returns true if it existed.
    pub fn delete_node(&self, node_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            existed = table.remove(node_id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Jobs ───────────────────────────────────────────────────────

    /// Insert or update a job.
    pub fn put_job(&self, job: &Job) -> StateResult<()> {
        let value = encode(job)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(JOBS).map_err(map_err!(Table))?;
            table
                .insert(job.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(job_id = %job.id, "job stored");
        Ok(())
    }

    /// Get a job by ID.
    pub fn get_job(&self, job_id: &str) -> StateResult<Option<Job>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(JOBS).map_err(map_err!(Table))?;
        match table.get(job_id).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }
}
