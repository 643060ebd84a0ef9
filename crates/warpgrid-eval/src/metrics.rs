//! Per-placement metrics accumulated while choosing a node for one
//! allocation.
//!
//! The placement algorithm feeds statistics into the current
//! [`AllocMetric`] as it filters and scores candidates; the evaluation
//! context swaps in an empty record on reset.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use warpgrid_state::NodeInfo;

/// Filtering and scoring statistics for a single placement attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AllocMetric {
    /// Nodes considered by the placement algorithm.
    pub nodes_evaluated: u32,
    /// Nodes rejected by a constraint or driver check.
    pub nodes_filtered: u32,
    /// Datacenter → number of nodes available before filtering.
    pub nodes_available: HashMap<String, u32>,
    /// Node class → nodes of that class filtered.
    pub class_filtered: HashMap<String, u32>,
    /// Constraint (rendered) → nodes it filtered.
    pub constraint_filtered: HashMap<String, u32>,
    /// Nodes that passed filtering but lacked resources.
    pub nodes_exhausted: u32,
    /// Node class → nodes of that class exhausted.
    pub class_exhausted: HashMap<String, u32>,
    /// Resource dimension (`memory`, `cpu`, ...) → nodes exhausted on it.
    pub dimension_exhausted: HashMap<String, u32>,
    /// `{node_id}.{scorer}` → score.
    pub scores: HashMap<String, f64>,
    /// Wall time spent on the placement.
    pub allocation_time: Duration,
    /// Identical failed placements folded into this one.
    pub coalesced_failures: u32,
}

impl AllocMetric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a node as considered.
    pub fn evaluate_node(&mut self) {
        self.nodes_evaluated += 1;
    }

    /// Count a node as filtered, attributing it to `constraint` when given.
    pub fn filter_node(&mut self, node: &NodeInfo, constraint: Option<&str>) {
        self.nodes_filtered += 1;
        if !node.node_class.is_empty() {
            *self.class_filtered.entry(node.node_class.clone()).or_insert(0) += 1;
        }
        if let Some(constraint) = constraint.filter(|c| !c.is_empty()) {
            *self
                .constraint_filtered
                .entry(constraint.to_string())
                .or_insert(0) += 1;
        }
    }

    /// Count a node as exhausted on `dimension`.
    pub fn exhaust_node(&mut self, node: &NodeInfo, dimension: Option<&str>) {
        self.nodes_exhausted += 1;
        if !node.node_class.is_empty() {
            *self.class_exhausted.entry(node.node_class.clone()).or_insert(0) += 1;
        }
        if let Some(dimension) = dimension.filter(|d| !d.is_empty()) {
            *self
                .dimension_exhausted
                .entry(dimension.to_string())
                .or_insert(0) += 1;
        }
    }

    /// Record the score a named scorer gave a node.
    pub fn score_node(&mut self, node: &NodeInfo, scorer: &str, score: f64) {
        self.scores.insert(format!("{}.{scorer}", node.id), score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, class: &str) -> NodeInfo {
        NodeInfo {
            id: id.to_string(),
            datacenter: "dc1".to_string(),
            node_class: class.to_string(),
            attributes: HashMap::new(),
            meta: HashMap::new(),
            computed_class: 0,
        }
    }

    #[test]
    fn filter_node_attributes_class_and_constraint() {
        let mut m = AllocMetric::new();
        m.evaluate_node();
        m.filter_node(&node("n1", "gpu"), Some("${attr.kernel.name} = linux"));
        m.filter_node(&node("n2", ""), None);

        assert_eq!(m.nodes_evaluated, 1);
        assert_eq!(m.nodes_filtered, 2);
        assert_eq!(m.class_filtered.get("gpu"), Some(&1));
        assert_eq!(m.class_filtered.len(), 1);
        assert_eq!(
            m.constraint_filtered.get("${attr.kernel.name} = linux"),
            Some(&1)
        );
    }

    #[test]
    fn exhaust_node_tracks_dimension() {
        let mut m = AllocMetric::new();
        m.exhaust_node(&node("n1", "compute"), Some("memory"));
        m.exhaust_node(&node("n2", "compute"), Some("memory"));

        assert_eq!(m.nodes_exhausted, 2);
        assert_eq!(m.class_exhausted.get("compute"), Some(&2));
        assert_eq!(m.dimension_exhausted.get("memory"), Some(&2));
    }

    #[test]
    fn score_node_keys_by_node_and_scorer() {
        let mut m = AllocMetric::new();
        m.score_node(&node("n1", ""), "binpack", 12.5);
        assert_eq!(m.scores.get("n1.binpack"), Some(&12.5));
    }
}
