//! Per-evaluation feasibility memoization keyed by computed node class.
//!
//! Running the full constraint checker against every node in a large fleet
//! is expensive, and nodes in the same computed class are interchangeable
//! as far as class-capturable constraints go. [`EvalEligibility`] remembers
//! the verdict for each class, once for the job's own constraints and once
//! per task group, so later nodes of the same class skip the checker.
//!
//! Memoization is unsound when a constraint looks outside the class (see
//! [`crate::escape`]) or when a node has no computed class at all; both
//! cases report [`ComputedClassFeasibility::Escaped`] and the caller must
//! evaluate the node itself.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};
use warpgrid_state::{ComputedClass, Constraint, Job, UNKNOWN_COMPUTED_CLASS};

use crate::escape::ConstraintEscape;

/// What is known about a computed class within one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputedClassFeasibility {
    /// Not yet evaluated.
    Unknown,
    /// Evaluated and rejected by a constraint.
    Ineligible,
    /// Evaluated and accepted.
    Eligible,
    /// A constraint is not captured by computed classes; memoized verdicts
    /// must not be trusted.
    Escaped,
}

impl ComputedClassFeasibility {
    fn from_verdict(eligible: bool) -> Self {
        if eligible {
            Self::Eligible
        } else {
            Self::Ineligible
        }
    }
}

type ClassMap = HashMap<ComputedClass, ComputedClassFeasibility>;

/// Eligibility of computed node classes over the course of one evaluation.
///
/// Created fresh for each evaluation and never shared; call
/// [`EvalEligibility::set_job`] before any status query.
#[derive(Debug, Clone)]
pub struct EvalEligibility {
    /// Job-level verdict per computed class.
    job: ClassMap,
    /// The job's own constraints escape computed classes.
    job_escaped: bool,
    /// Task group → verdict per computed class.
    task_groups: HashMap<String, ClassMap>,
    /// Task group → its (or its tasks') constraints escape.
    tg_escaped_constraints: HashMap<String, bool>,
    /// When false every query reports `Escaped`.
    memoization: bool,
}

impl Default for EvalEligibility {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalEligibility {
    pub fn new() -> Self {
        Self {
            job: HashMap::new(),
            job_escaped: false,
            task_groups: HashMap::new(),
            tg_escaped_constraints: HashMap::new(),
            memoization: true,
        }
    }

    /// A tracker that never memoizes: every status query is `Escaped`.
    pub fn disabled() -> Self {
        Self {
            memoization: false,
            ..Self::new()
        }
    }

    /// Compute escape flags for the job and each of its task groups.
    ///
    /// A task group escapes when its own constraints or any of its tasks'
    /// constraints do.
    pub fn set_job<E>(&mut self, job: &Job, escape: &E)
    where
        E: ConstraintEscape + ?Sized,
    {
        let job_constraints: Vec<&Constraint> = job.constraints.iter().collect();
        let escaped = escape.escaped_constraints(&job_constraints);
        self.job_escaped = !escaped.is_empty();
        if self.job_escaped {
            debug!(
                job_id = %job.id,
                escaped = escaped.len(),
                "job constraints escape computed node classes"
            );
        }

        for tg in &job.task_groups {
            let escaped = !escape
                .escaped_constraints(&tg.combined_constraints())
                .is_empty();
            if escaped {
                debug!(
                    job_id = %job.id,
                    task_group = %tg.name,
                    "task group constraints escape computed node classes"
                );
            }
            self.tg_escaped_constraints.insert(tg.name.clone(), escaped);
        }
    }

    /// Whether memoization is unsafe at the job level or for any task group.
    pub fn has_escaped(&self) -> bool {
        !self.memoization || self.job_escaped || self.tg_escaped_constraints.values().any(|e| *e)
    }

    /// Eligible and ineligible classes, pooled across the job and every
    /// task group.
    pub fn get_classes(&self) -> (HashSet<ComputedClass>, HashSet<ComputedClass>) {
        let mut eligible = HashSet::new();
        let mut ineligible = HashSet::new();

        let scopes = std::iter::once(&self.job).chain(self.task_groups.values());
        for (class, feasibility) in scopes.flatten() {
            match feasibility {
                ComputedClassFeasibility::Eligible => {
                    eligible.insert(*class);
                }
                ComputedClassFeasibility::Ineligible => {
                    ineligible.insert(*class);
                }
                ComputedClassFeasibility::Unknown | ComputedClassFeasibility::Escaped => {}
            }
        }

        (eligible, ineligible)
    }

    /// Job-level status of `class`.
    ///
    /// Nodes without a computed class (class `0`) always report `Escaped`:
    /// disabling the optimization is the only safe answer for them.
    pub fn job_status(&self, class: ComputedClass) -> ComputedClassFeasibility {
        if !self.memoization || self.job_escaped || class == UNKNOWN_COMPUTED_CLASS {
            trace!(
                job_escaped = self.job_escaped,
                memoization = self.memoization,
                class,
                "job eligibility escaped"
            );
            return ComputedClassFeasibility::Escaped;
        }

        match self.job.get(&class) {
            Some(status) => *status,
            None => ComputedClassFeasibility::Unknown,
        }
    }

    /// Record the job-level verdict for `class`. Last write wins.
    pub fn set_job_eligibility(&mut self, eligible: bool, class: ComputedClass) {
        self.job
            .insert(class, ComputedClassFeasibility::from_verdict(eligible));
    }

    /// Status of `class` for task group `tg`.
    pub fn task_group_status(&self, tg: &str, class: ComputedClass) -> ComputedClassFeasibility {
        if !self.memoization || class == UNKNOWN_COMPUTED_CLASS {
            return ComputedClassFeasibility::Escaped;
        }

        if self.tg_escaped_constraints.get(tg).copied().unwrap_or(false) {
            return ComputedClassFeasibility::Escaped;
        }

        match self.task_groups.get(tg).and_then(|classes| classes.get(&class)) {
            Some(status) => *status,
            None => ComputedClassFeasibility::Unknown,
        }
    }

    /// Record the verdict for `class` in task group `tg`.
    pub fn set_task_group_eligibility(&mut self, eligible: bool, tg: &str, class: ComputedClass) {
        self.task_groups
            .entry(tg.to_string())
            .or_default()
            .insert(class, ComputedClassFeasibility::from_verdict(eligible));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpgrid_state::{ConstraintOperand, Task, TaskGroup};

    use crate::escape::UniqueTargetEscape;

    fn plain() -> Constraint {
        Constraint::new("${attr.kernel.name}", ConstraintOperand::Equal, "linux")
    }

    fn unique() -> Constraint {
        Constraint::new("${node.unique.id}", ConstraintOperand::Equal, "n1")
    }

    fn group(name: &str, constraints: Vec<Constraint>, task: Vec<Constraint>) -> TaskGroup {
        TaskGroup {
            name: name.to_string(),
            count: 1,
            constraints,
            tasks: vec![Task {
                name: format!("{name}-task"),
                constraints: task,
            }],
        }
    }

    fn job(constraints: Vec<Constraint>, task_groups: Vec<TaskGroup>) -> Job {
        Job {
            id: "example".to_string(),
            priority: 50,
            datacenters: vec!["dc1".to_string()],
            constraints,
            task_groups,
        }
    }

    fn tracker_for(job: &Job) -> EvalEligibility {
        let mut e = EvalEligibility::new();
        e.set_job(job, &UniqueTargetEscape::default());
        e
    }

    #[test]
    fn job_status_unknown_until_set() {
        let mut e = tracker_for(&job(vec![plain()], Vec::new()));

        assert_eq!(e.job_status(7), ComputedClassFeasibility::Unknown);
        e.set_job_eligibility(true, 7);
        assert_eq!(e.job_status(7), ComputedClassFeasibility::Eligible);
        assert_eq!(e.job_status(8), ComputedClassFeasibility::Unknown);

        e.set_job_eligibility(false, 8);
        assert_eq!(e.job_status(8), ComputedClassFeasibility::Ineligible);
    }

    #[test]
    fn set_job_eligibility_last_write_wins() {
        let mut e = EvalEligibility::new();
        e.set_job_eligibility(true, 4);
        e.set_job_eligibility(false, 4);
        assert_eq!(e.job_status(4), ComputedClassFeasibility::Ineligible);
    }

    #[test]
    fn class_zero_always_escapes() {
        let mut e = tracker_for(&job(Vec::new(), vec![group("web", Vec::new(), Vec::new())]));
        e.set_job_eligibility(true, 0);
        e.set_task_group_eligibility(true, "web", 0);

        assert_eq!(e.job_status(0), ComputedClassFeasibility::Escaped);
        assert_eq!(e.task_group_status("web", 0), ComputedClassFeasibility::Escaped);
        assert!(!e.has_escaped());
    }

    #[test]
    fn escaped_job_overrides_recorded_verdicts() {
        let mut e = tracker_for(&job(vec![plain(), unique()], Vec::new()));
        e.set_job_eligibility(true, 3);

        assert!(e.has_escaped());
        assert_eq!(e.job_status(3), ComputedClassFeasibility::Escaped);
        assert_eq!(e.job_status(99), ComputedClassFeasibility::Escaped);
    }

    #[test]
    fn task_group_escape_considers_task_constraints() {
        let j = job(
            Vec::new(),
            vec![
                group("web", vec![plain()], Vec::new()),
                group("db", Vec::new(), vec![unique()]),
            ],
        );
        let mut e = tracker_for(&j);
        e.set_task_group_eligibility(true, "web", 5);
        e.set_task_group_eligibility(true, "db", 5);

        assert!(e.has_escaped());
        assert_eq!(e.task_group_status("web", 5), ComputedClassFeasibility::Eligible);
        assert_eq!(e.task_group_status("db", 5), ComputedClassFeasibility::Escaped);
        // Task group escape does not leak into the job scope.
        assert_eq!(e.job_status(5), ComputedClassFeasibility::Unknown);
    }

    #[test]
    fn task_groups_are_independent_namespaces() {
        let j = job(
            Vec::new(),
            vec![
                group("web", Vec::new(), Vec::new()),
                group("db", Vec::new(), Vec::new()),
            ],
        );
        let mut e = tracker_for(&j);
        e.set_task_group_eligibility(true, "web", 3);

        assert_eq!(e.task_group_status("web", 3), ComputedClassFeasibility::Eligible);
        assert_eq!(e.task_group_status("db", 3), ComputedClassFeasibility::Unknown);
        assert_eq!(e.job_status(3), ComputedClassFeasibility::Unknown);

        e.set_task_group_eligibility(false, "db", 3);
        assert_eq!(e.task_group_status("db", 3), ComputedClassFeasibility::Ineligible);
        assert_eq!(e.task_group_status("web", 3), ComputedClassFeasibility::Eligible);
    }

    #[test]
    fn unknown_task_group_reports_unknown() {
        let e = tracker_for(&job(Vec::new(), Vec::new()));
        assert_eq!(e.task_group_status("cache", 9), ComputedClassFeasibility::Unknown);
    }

    #[test]
    fn has_escaped_false_without_escaping_constraints() {
        let j = job(vec![plain()], vec![group("web", vec![plain()], vec![plain()])]);
        assert!(!tracker_for(&j).has_escaped());
    }

    #[test]
    fn get_classes_pools_job_and_task_groups() {
        let mut e = EvalEligibility::new();
        e.set_job_eligibility(true, 1);
        e.set_job_eligibility(false, 2);
        e.set_task_group_eligibility(true, "web", 3);

        let (eligible, ineligible) = e.get_classes();
        assert_eq!(eligible, HashSet::from([1, 3]));
        assert_eq!(ineligible, HashSet::from([2]));
    }

    #[test]
    fn get_classes_empty_tracker() {
        let (eligible, ineligible) = EvalEligibility::new().get_classes();
        assert!(eligible.is_empty());
        assert!(ineligible.is_empty());
    }

    #[test]
    fn injected_predicate_drives_escape() {
        let j = job(vec![plain()], vec![group("web", Vec::new(), vec![plain()])]);
        let mut e = EvalEligibility::new();
        let everything_escapes = |_: &Constraint| true;
        e.set_job(&j, &everything_escapes);

        assert_eq!(e.job_status(1), ComputedClassFeasibility::Escaped);
        assert_eq!(e.task_group_status("web", 1), ComputedClassFeasibility::Escaped);
    }

    #[test]
    fn disabled_tracker_always_escapes() {
        let mut e = EvalEligibility::disabled();
        e.set_job_eligibility(true, 1);
        e.set_task_group_eligibility(true, "web", 1);

        assert!(e.has_escaped());
        assert_eq!(e.job_status(1), ComputedClassFeasibility::Escaped);
        assert_eq!(e.task_group_status("web", 1), ComputedClassFeasibility::Escaped);
    }
}
