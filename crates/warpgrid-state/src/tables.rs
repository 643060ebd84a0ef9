//! redb table definitions for the WarpGrid state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Allocations keyed by `{node_id}/{alloc_id}`.
pub const ALLOCATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("allocations");

/// Allocation ID → owning node ID, for lookups by ID alone.
pub const ALLOC_INDEX: TableDefinition<&str, &str> = TableDefinition::new("alloc_index");

/// Node info keyed by `{node_id}`.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Jobs keyed by `{job_id}`.
pub const JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");
