//! Regex and version constraint checks that compile through the
//! evaluation caches.
//!
//! Each distinct pattern or version requirement is compiled at most once
//! per evaluation. Invalid patterns never match and are not cached, so
//! they are re-reported (at debug level) each time they are hit.

use regex::Regex;
use semver::{Version, VersionReq};
use tracing::debug;

use crate::context::Context;

/// Whether `value` matches the regular expression `pattern`.
pub fn check_regexp_match<C>(ctx: &mut C, value: &str, pattern: &str) -> bool
where
    C: Context + ?Sized,
{
    let cache = ctx.regexp_cache();
    if let Some(re) = cache.get(pattern) {
        return re.is_match(value);
    }

    match Regex::new(pattern) {
        Ok(re) => {
            let matched = re.is_match(value);
            cache.insert(pattern.to_string(), re);
            matched
        }
        Err(err) => {
            debug!(%pattern, %err, "invalid regexp constraint");
            false
        }
    }
}

/// Whether the version `value` satisfies the requirement `expr`
/// (e.g. `">= 1.2, < 2"`).
pub fn check_version_match<C>(ctx: &mut C, value: &str, expr: &str) -> bool
where
    C: Context + ?Sized,
{
    let Some(version) = parse_version(value) else {
        debug!(%value, "unparseable version in constraint target");
        return false;
    };

    let cache = ctx.constraint_cache();
    if let Some(req) = cache.get(expr) {
        return req.matches(&version);
    }

    match VersionReq::parse(expr) {
        Ok(req) => {
            let matched = req.matches(&version);
            cache.insert(expr.to_string(), req);
            matched
        }
        Err(err) => {
            debug!(%expr, %err, "invalid version constraint");
            false
        }
    }
}

/// Parse a node-reported version, tolerating a leading `v` and missing
/// minor/patch components (`"1.20"` → `1.20.0`).
fn parse_version(value: &str) -> Option<Version> {
    let trimmed = value.trim().trim_start_matches('v');
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    let (core, rest) = match trimmed.find(['-', '+']) {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, ""),
    };
    let parts = core.split('.').count();
    if parts >= 3 {
        return None;
    }
    let padded = format!("{core}{}{rest}", ".0".repeat(3 - parts));
    Version::parse(&padded).ok()
}
