//! Escape analysis: which constraints computed node classes cannot capture.
//!
//! Class-keyed memoization is only sound when every constraint looks at
//! attributes that are part of the computed class. A constraint on a
//! per-node unique attribute, or one that compares siblings such as
//! `distinct_hosts`, "escapes" the class and forces per-node evaluation.

use warpgrid_state::{Constraint, ConstraintOperand};

use crate::config::EscapeConfig;

/// Decides whether a constraint escapes computed-class capture.
///
/// Any `Fn(&Constraint) -> bool` is an analyzer, which keeps the
/// eligibility tracker testable without a constraint engine.
pub trait ConstraintEscape {
    fn escapes(&self, constraint: &Constraint) -> bool;

    /// The subset of `constraints` that escape.
    fn escaped_constraints<'a>(&self, constraints: &[&'a Constraint]) -> Vec<&'a Constraint> {
        constraints
            .iter()
            .copied()
            .filter(|c| self.escapes(c))
            .collect()
    }
}

impl<F> ConstraintEscape for F
where
    F: Fn(&Constraint) -> bool,
{
    fn escapes(&self, constraint: &Constraint) -> bool {
        self(constraint)
    }
}

/// Default analyzer: escapes on per-node unique targets and on
/// sibling-comparing operands.
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueTargetEscape {
    target_prefixes: Vec<String>,
    operands: Vec<ConstraintOperand>,
}

impl UniqueTargetEscape {
    /// Build from configuration. Unknown operand names are skipped;
    /// [`crate::EvalConfig::validate`] rejects them up front.
    pub fn from_config(config: &EscapeConfig) -> Self {
        Self {
            target_prefixes: config.target_prefixes.clone(),
            operands: config
                .operands
                .iter()
                .filter_map(|name| ConstraintOperand::from_name(name))
                .collect(),
        }
    }

    fn target_escapes(&self, target: &str) -> bool {
        self.target_prefixes
            .iter()
            .any(|prefix| target.starts_with(prefix.as_str()))
    }
}

impl Default for UniqueTargetEscape {
    fn default() -> Self {
        Self::from_config(&EscapeConfig::default())
    }
}

impl ConstraintEscape for UniqueTargetEscape {
    fn escapes(&self, constraint: &Constraint) -> bool {
        self.operands.contains(&constraint.operand)
            || self.target_escapes(&constraint.l_target)
            || self.target_escapes(&constraint.r_target)
    }
}
