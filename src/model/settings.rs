//! Global settings and per-target overrides (§3, §4.10).
//!
//! Mirrors `<store>/sync-settings.json`: global settings, pattern sets, and
//! a `per_target_overrides` section keyed by `store_path` (§6).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::pattern::{PatternEntry, PatternKind};

/// Global engine settings. `size_block_bytes` defaults to 512 MiB when
/// absent, zero, negative, or non-numeric (§4.2).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub size_block_bytes: u64,
    pub debounce_ms: u64,
    pub self_change_ttl_ms: u64,
}

pub const DEFAULT_SIZE_BLOCK_BYTES: u64 = 512 * 1024 * 1024;
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_SELF_CHANGE_TTL_MS: u64 = 1_000;

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            size_block_bytes: DEFAULT_SIZE_BLOCK_BYTES,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            self_change_ttl_ms: DEFAULT_SELF_CHANGE_TTL_MS,
        }
    }
}

/// A target-only pattern, keyed by which set it belongs to (§4.10).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalPatternOverride {
    pub kind: PatternKind,
    pub pattern: String,
    pub enabled: bool,
}

/// Per-target override bundle exported alongside global settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetOverrides {
    /// `"<kind>:<pattern>"` -> overridden `enabled`, for patterns known
    /// globally.
    #[serde(default)]
    pub enabled_overrides: BTreeMap<String, bool>,
    /// Target-only patterns with their own `enabled` flag.
    #[serde(default)]
    pub local_patterns: Vec<LocalPatternOverride>,
}

/// The full exported snapshot written to `<store>/sync-settings.json`.
/// Keys are sorted at every level for stable git diffs (§3, §6).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    #[serde(flatten)]
    pub global: GlobalSettings,
    pub file_patterns: Vec<PatternEntry>,
    pub ignore_patterns: Vec<PatternEntry>,
    /// Keyed by `store_path`, sorted.
    pub per_target_overrides: BTreeMap<String, TargetOverrides>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_spec_defaults() {
        let s = GlobalSettings::default();
        assert_eq!(s.size_block_bytes, DEFAULT_SIZE_BLOCK_BYTES);
        assert_eq!(s.debounce_ms, 300);
        assert_eq!(s.self_change_ttl_ms, 1_000);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut snapshot = SettingsSnapshot {
            global: GlobalSettings::default(),
            ..Default::default()
        };
        snapshot.per_target_overrides.insert(
            "repos/my-app".into(),
            TargetOverrides {
                enabled_overrides: BTreeMap::from([("*.log".to_string(), false)]),
                local_patterns: vec![],
            },
        );
        let json = serde_json::to_string_pretty(&snapshot).unwrap();
        let back: SettingsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, back);
    }
}
