//! Domain types for the WarpGrid state store.
//!
//! These types represent the persisted cluster state a scheduling
//! evaluation reads: nodes and their computed classes, allocations placed
//! on those nodes, and the jobs (with their constraints) being scheduled.
//! All types are serializable to/from JSON for storage in redb tables.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Unique identifier for a node in the cluster.
pub type NodeId = String;

/// Unique identifier for an allocation.
pub type AllocId = String;

/// Unique identifier for a job.
pub type JobId = String;

/// Handle for an equivalence class of nodes sharing every
/// scheduling-relevant attribute. `0` means no class was computed.
pub type ComputedClass = u64;

/// Reserved computed class for nodes whose class is unknown.
pub const UNKNOWN_COMPUTED_CLASS: ComputedClass = 0;

/// Attribute and meta keys under this prefix are unique per node and are
/// left out of the computed class.
pub const UNIQUE_NAMESPACE: &str = "unique.";

// ── Node ──────────────────────────────────────────────────────────

/// Information about a node in the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub datacenter: String,
    /// Operator-assigned class (free-form, may be empty).
    pub node_class: String,
    /// Fingerprinted attributes (`kernel.name`, `unique.hostname`, ...).
    pub attributes: HashMap<String, String>,
    /// Operator metadata.
    pub meta: HashMap<String, String>,
    /// Computed class, see [`NodeInfo::compute_class`].
    #[serde(default)]
    pub computed_class: ComputedClass,
}

#[derive(Serialize)]
struct ClassKey<'a> {
    datacenter: &'a str,
    node_class: &'a str,
    attributes: BTreeMap<&'a str, &'a str>,
    meta: BTreeMap<&'a str, &'a str>,
}

impl NodeInfo {
    /// Derive the computed class from the scheduling-relevant fields.
    ///
    /// Two nodes get the same class iff their datacenter, node class, and
    /// non-unique attributes and meta are equal. Never returns
    /// [`UNKNOWN_COMPUTED_CLASS`].
    pub fn compute_class(&self) -> ComputedClass {
        fn shared(map: &HashMap<String, String>) -> BTreeMap<&str, &str> {
            map.iter()
                .filter(|(k, _)| !k.starts_with(UNIQUE_NAMESPACE))
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect()
        }

        let key = ClassKey {
            datacenter: &self.datacenter,
            node_class: &self.node_class,
            attributes: shared(&self.attributes),
            meta: shared(&self.meta),
        };
        let canonical =
            serde_json::to_vec(&key).expect("class key of string fields serializes to JSON");
        let digest = Sha256::digest(&canonical);

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        match u64::from_be_bytes(bytes) {
            UNKNOWN_COMPUTED_CLASS => 1,
            class => class,
        }
    }

    /// Recompute and store the computed class.
    pub fn refresh_computed_class(&mut self) {
        self.computed_class = self.compute_class();
    }
}

// ── Allocation ────────────────────────────────────────────────────

/// What the scheduler wants an allocation to be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocDesiredStatus {
    Run,
    Stop,
    Evict,
    Failed,
}

/// What the client reports an allocation is actually doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocClientStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

/// Resources claimed by an allocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AllocResources {
    pub cpu_mhz: u32,
    pub memory_mb: u64,
    pub disk_mb: u64,
}

/// An instance of a task group placed on a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Allocation {
    pub id: AllocId,
    pub eval_id: String,
    /// Human readable name, `{job}.{group}[{index}]`.
    pub name: String,
    pub node_id: NodeId,
    pub job_id: JobId,
    pub task_group: String,
    pub desired_status: AllocDesiredStatus,
    pub client_status: AllocClientStatus,
    pub resources: AllocResources,
    pub create_index: u64,
}

impl Allocation {
    /// Whether the allocation no longer consumes resources on its node.
    pub fn terminal_status(&self) -> bool {
        matches!(
            self.desired_status,
            AllocDesiredStatus::Stop | AllocDesiredStatus::Evict | AllocDesiredStatus::Failed
        ) || matches!(
            self.client_status,
            AllocClientStatus::Complete | AllocClientStatus::Failed
        )
    }

    /// Build the composite key for the allocations table.
    pub fn table_key(&self) -> String {
        alloc_key(&self.node_id, &self.id)
    }
}

/// Composite allocations-table key for `alloc_id` on `node_id`.
pub fn alloc_key(node_id: &str, alloc_id: &str) -> String {
    format!("{node_id}/{alloc_id}")
}

// ── Job ───────────────────────────────────────────────────────────

/// How a constraint compares its left and right targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintOperand {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "regexp")]
    Regexp,
    #[serde(rename = "version")]
    Version,
    #[serde(rename = "distinct_hosts")]
    DistinctHosts,
}

impl ConstraintOperand {
    pub const ALL: [ConstraintOperand; 9] = [
        Self::Equal,
        Self::NotEqual,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::Regexp,
        Self::Version,
        Self::DistinctHosts,
    ];

    /// Parse a canonical operand name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    /// Canonical operand name, as used in job files and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::Regexp => "regexp",
            Self::Version => "version",
            Self::DistinctHosts => "distinct_hosts",
        }
    }
}

/// A placement constraint, e.g. `${attr.kernel.name} = linux`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Constraint {
    pub l_target: String,
    pub r_target: String,
    pub operand: ConstraintOperand,
}

impl Constraint {
    pub fn new(
        l_target: impl Into<String>,
        operand: ConstraintOperand,
        r_target: impl Into<String>,
    ) -> Self {
        Self {
            l_target: l_target.into(),
            r_target: r_target.into(),
            operand,
        }
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.l_target, self.operand.as_str(), self.r_target)
    }
}

/// A single task inside a task group.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub name: String,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

/// A set of tasks that are always placed together on one node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskGroup {
    pub name: String,
    pub count: u32,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TaskGroup {
    /// The group's own constraints followed by every task's constraints.
    pub fn combined_constraints(&self) -> Vec<&Constraint> {
        self.constraints
            .iter()
            .chain(self.tasks.iter().flat_map(|t| t.constraints.iter()))
            .collect()
    }
}

/// A job submitted for scheduling.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub priority: u32,
    #[serde(default)]
    pub datacenters: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub task_groups: Vec<TaskGroup>,
}
