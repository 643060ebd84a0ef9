//! Memoization caches scoped to one evaluation.
//!
//! Constraint checks compile the same regular expressions and parse the
//! same version requirements for every candidate node. The caches here are
//! plain maps handed out to callers, who compile-or-fetch through them. The
//! maps are allocated on first access and live until the evaluation ends;
//! nothing is ever evicted.

use std::collections::HashMap;

use regex::Regex;
use semver::VersionReq;

/// Lazily allocated regex and version-requirement caches.
#[derive(Debug, Default)]
pub struct EvalCache {
    re_cache: Option<HashMap<String, Regex>>,
    constraint_cache: Option<HashMap<String, VersionReq>>,
}

impl EvalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pattern → compiled regex.
    pub fn regexp_cache(&mut self) -> &mut HashMap<String, Regex> {
        self.re_cache.get_or_insert_with(HashMap::new)
    }

    /// Version constraint expression → parsed requirement.
    pub fn constraint_cache(&mut self) -> &mut HashMap<String, VersionReq> {
        self.constraint_cache.get_or_insert_with(HashMap::new)
    }
}
