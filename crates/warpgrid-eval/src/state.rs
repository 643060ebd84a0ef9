//! Read-only view of cluster state consumed by an evaluation.

use warpgrid_state::{Allocation, StateResult, StateStore};

/// The slice of cluster state an evaluation context reads.
///
/// Implementations are shared by every concurrently running evaluation,
/// hence `Send + Sync`; the context never writes through this trait.
pub trait State: Send + Sync {
    /// Every allocation recorded against `node_id`, regardless of status.
    fn allocs_by_node(&self, node_id: &str) -> StateResult<Vec<Allocation>>;
}

impl State for StateStore {
    fn allocs_by_node(&self, node_id: &str) -> StateResult<Vec<Allocation>> {
        StateStore::allocs_by_node(self, node_id)
    }
}
