//! warpgrid-state — cluster state store for WarpGrid scheduling.
//!
//! Backed by [redb](https://docs.rs/redb), holds the nodes, allocations,
//! and jobs that a scheduling evaluation reads while deciding placements.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Allocations are keyed `{node_id}/{alloc_id}` so that every allocation
//! on a node can be read back with a single prefix scan.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared by many concurrent evaluations as a read-only view.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
