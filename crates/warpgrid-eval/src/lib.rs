//! WarpGrid evaluation context — the per-evaluation state a placement
//! algorithm consults while deciding where allocations go.
//!
//! This crate does NOT pick nodes or score them. It answers the questions
//! the placement algorithm asks over and over during one evaluation, and
//! keeps those answers correct and cheap.
//!
//! # Components
//!
//! - **`context`** — `EvalContext`: state handle, in-flight plan, metrics,
//!   and the proposed-allocations overlay
//! - **`eligibility`** — feasibility memoization per computed node class
//! - **`escape`** — which constraints computed classes cannot capture
//! - **`cache`** — per-evaluation regex and version requirement caches
//! - **`constraint`** — regex/version checks that go through the caches
//! - **`plan`** / **`metrics`** — the records the context carries
//!
//! # Architecture
//!
//! ```text
//! EvalContext (one per evaluation, single writer)
//!   ├── Arc<dyn State>  (shared, read-only: allocs_by_node)
//!   ├── Plan            (node_update / node_allocation)
//!   ├── AllocMetric     (replaced on reset)
//!   ├── EvalCache       (regex + version caches, lazy)
//!   └── EvalEligibility (lazy, lives for the whole evaluation)
//! ```

pub mod cache;
pub mod config;
pub mod constraint;
pub mod context;
pub mod eligibility;
pub mod error;
pub mod escape;
pub mod metrics;
pub mod plan;
pub mod state;

pub use cache::EvalCache;
pub use config::{EscapeConfig, EvalConfig};
pub use constraint::{check_regexp_match, check_version_match};
pub use context::{Context, EvalContext};
pub use eligibility::{ComputedClassFeasibility, EvalEligibility};
pub use error::{EvalError, EvalResult};
pub use escape::{ConstraintEscape, UniqueTargetEscape};
pub use metrics::AllocMetric;
pub use plan::{Plan, filter_terminal_allocs, remove_allocs};
pub use state::State;
