//! The in-flight plan assembled over one evaluation.
//!
//! A plan records, per node, the allocations the placement algorithm wants
//! to stop or evict (`node_update`) and the allocations it wants to place
//! (`node_allocation`). Nothing is applied to cluster state until the plan
//! is submitted; the evaluation context overlays it on state to answer
//! "what would this node look like".

use std::collections::{HashMap, HashSet};

use warpgrid_state::{AllocDesiredStatus, Allocation, NodeId};

/// Pending placement and eviction decisions for one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub eval_id: String,
    pub priority: u32,
    /// Node-id → allocations being stopped or evicted on that node.
    pub node_update: HashMap<NodeId, Vec<Allocation>>,
    /// Node-id → allocations newly placed on that node.
    pub node_allocation: HashMap<NodeId, Vec<Allocation>>,
}

impl Plan {
    pub fn new(eval_id: impl Into<String>, priority: u32) -> Self {
        Self {
            eval_id: eval_id.into(),
            priority,
            ..Default::default()
        }
    }

    /// Record that `alloc` should move to `desired_status` on its node.
    pub fn append_update(&mut self, alloc: &Allocation, desired_status: AllocDesiredStatus) {
        let mut update = alloc.clone();
        update.desired_status = desired_status;
        self.node_update
            .entry(alloc.node_id.clone())
            .or_default()
            .push(update);
    }

    /// Undo the most recent update for `alloc`, if it was the last one
    /// recorded on its node.
    pub fn pop_update(&mut self, alloc: &Allocation) {
        let Some(updates) = self.node_update.get_mut(&alloc.node_id) else {
            return;
        };
        if updates.last().is_some_and(|last| last.id == alloc.id) {
            updates.pop();
        }
        if updates.is_empty() {
            self.node_update.remove(&alloc.node_id);
        }
    }

    /// Record a new placement on the allocation's node.
    pub fn append_alloc(&mut self, alloc: Allocation) {
        self.node_allocation
            .entry(alloc.node_id.clone())
            .or_default()
            .push(alloc);
    }

    /// True when submitting the plan would change nothing.
    pub fn is_no_op(&self) -> bool {
        self.node_update.values().all(Vec::is_empty)
            && self.node_allocation.values().all(Vec::is_empty)
    }
}

/// Drop allocations that no longer consume resources on their node.
pub fn filter_terminal_allocs(allocs: Vec<Allocation>) -> Vec<Allocation> {
    allocs
        .into_iter()
        .filter(|alloc| !alloc.terminal_status())
        .collect()
}

/// Remove every allocation whose ID appears in `remove`.
pub fn remove_allocs(allocs: Vec<Allocation>, remove: &[Allocation]) -> Vec<Allocation> {
    let ids: HashSet<&str> = remove.iter().map(|a| a.id.as_str()).collect();
    allocs
        .into_iter()
        .filter(|alloc| !ids.contains(alloc.id.as_str()))
        .collect()
}
