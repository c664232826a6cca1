//! Pattern registry model (§3) — glob entries shared across targets plus
//! per-target overrides.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Include,
    Ignore,
}

/// Where a pattern entry came from. A per-target override changes only the
/// effective `enabled` flag of a `Global` pattern — the pattern's identity
/// and source never become `Local` through an override (§4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSource {
    Default,
    User,
    /// Target-only pattern added via `pattern_local` (§3).
    Local,
}

/// One resolved pattern entry as returned by the pattern resolver (§4.3):
/// `[{pattern, enabled, source}]`, local patterns preceding global ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub pattern: String,
    pub enabled: bool,
    pub source: PatternSource,
}
