//! Evaluation context error types.

use thiserror::Error;
use warpgrid_state::StateError;

/// Errors surfaced by the evaluation context.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Cluster state could not be read. Passed through untouched; the
    /// placement algorithm decides whether to skip the node or abort.
    #[error("state access error: {0}")]
    State(#[from] StateError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type EvalResult<T> = Result<T, EvalError>;
