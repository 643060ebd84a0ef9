//! The evaluation context — everything a placement algorithm consults while
//! deciding where one evaluation's allocations go.
//!
//! One [`EvalContext`] serves exactly one evaluation, driven by one worker.
//! The plan, metrics, caches, and eligibility tracker it owns are private
//! to that evaluation; only the cluster state handle is shared (read-only)
//! with other evaluations. Mutating operations take `&mut self`, so the
//! single-writer precondition is enforced by the borrow checker rather than
//! by locks.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use semver::VersionReq;
use tracing::debug;
use warpgrid_state::{Allocation, Job};

use crate::cache::EvalCache;
use crate::config::EvalConfig;
use crate::eligibility::EvalEligibility;
use crate::error::EvalResult;
use crate::escape::UniqueTargetEscape;
use crate::metrics::AllocMetric;
use crate::plan::{Plan, filter_terminal_allocs, remove_allocs};
use crate::state::State;

/// Contextual information used for placement.
pub trait Context {
    /// The cluster state being scheduled against.
    fn state(&self) -> &dyn State;

    /// The plan assembled so far.
    fn plan(&self) -> &Plan;

    fn plan_mut(&mut self) -> &mut Plan;

    /// Metrics for the placement in progress.
    fn metrics(&self) -> &AllocMetric;

    fn metrics_mut(&mut self) -> &mut AllocMetric;

    /// Start a new placement: the metrics record is replaced, while the
    /// plan, caches, and eligibility tracker carry over.
    fn reset(&mut self);

    /// The allocations `node_id` would hold if the plan were applied:
    /// existing non-terminal allocations, minus planned evictions, plus
    /// planned placements.
    fn proposed_allocs(&self, node_id: &str) -> EvalResult<Vec<Allocation>>;

    /// Regex cache for constraint checks.
    fn regexp_cache(&mut self) -> &mut HashMap<String, Regex>;

    /// Version requirement cache for constraint checks.
    fn constraint_cache(&mut self) -> &mut HashMap<String, VersionReq>;

    /// Computed-class eligibility for this evaluation.
    fn eligibility(&mut self) -> &mut EvalEligibility;
}

/// A [`Context`] used during an evaluation.
pub struct EvalContext {
    cache: EvalCache,
    state: Arc<dyn State>,
    plan: Plan,
    metrics: AllocMetric,
    eligibility: Option<EvalEligibility>,
    config: EvalConfig,
    escape: UniqueTargetEscape,
}

impl EvalContext {
    /// Create a context with the default configuration.
    pub fn new(state: Arc<dyn State>, plan: Plan) -> Self {
        Self::with_config(state, plan, EvalConfig::default())
    }

    pub fn with_config(state: Arc<dyn State>, plan: Plan, config: EvalConfig) -> Self {
        let escape = UniqueTargetEscape::from_config(&config.escape);
        Self {
            cache: EvalCache::new(),
            state,
            plan,
            metrics: AllocMetric::new(),
            eligibility: None,
            config,
            escape,
        }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Swap the state handle, e.g. after refreshing to a newer snapshot.
    pub fn set_state(&mut self, state: Arc<dyn State>) {
        self.state = state;
    }

    /// Load `job` into the eligibility tracker using the configured
    /// escape analysis.
    pub fn set_job(&mut self, job: &Job) {
        let memoization = self.config.class_memoization;
        self.eligibility
            .get_or_insert_with(|| new_eligibility(memoization))
            .set_job(job, &self.escape);
    }

    /// Consume the context, yielding the finished plan.
    pub fn into_plan(self) -> Plan {
        self.plan
    }
}

fn new_eligibility(memoization: bool) -> EvalEligibility {
    if memoization {
        EvalEligibility::new()
    } else {
        EvalEligibility::disabled()
    }
}

impl Context for EvalContext {
    fn state(&self) -> &dyn State {
        self.state.as_ref()
    }

    fn plan(&self) -> &Plan {
        &self.plan
    }

    fn plan_mut(&mut self) -> &mut Plan {
        &mut self.plan
    }

    fn metrics(&self) -> &AllocMetric {
        &self.metrics
    }

    fn metrics_mut(&mut self) -> &mut AllocMetric {
        &mut self.metrics
    }

    fn reset(&mut self) {
        self.metrics = AllocMetric::new();
    }

    fn proposed_allocs(&self, node_id: &str) -> EvalResult<Vec<Allocation>> {
        let existing = self.state.allocs_by_node(node_id)?;
        let existing_count = existing.len();

        let mut proposed = filter_terminal_allocs(existing);
        if let Some(update) = self.plan.node_update.get(node_id).filter(|u| !u.is_empty()) {
            proposed = remove_allocs(proposed, update);
        }
        if let Some(placed) = self.plan.node_allocation.get(node_id) {
            proposed.extend(placed.iter().cloned());
        }

        debug!(
            node_id,
            existing = existing_count,
            proposed = proposed.len(),
            "computed proposed allocations"
        );
        Ok(proposed)
    }

    fn regexp_cache(&mut self) -> &mut HashMap<String, Regex> {
        self.cache.regexp_cache()
    }

    fn constraint_cache(&mut self) -> &mut HashMap<String, VersionReq> {
        self.cache.constraint_cache()
    }

    fn eligibility(&mut self) -> &mut EvalEligibility {
        let memoization = self.config.class_memoization;
        self.eligibility
            .get_or_insert_with(|| new_eligibility(memoization))
    }
}
