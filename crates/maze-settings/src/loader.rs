//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`MazeSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `MAZE_*` environment variable overrides (highest priority)
//! 4. Reject values the server cannot run with
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::MazeSettings;

/// `~/.maze`, or `/tmp/.maze` when `HOME` is unset.
pub fn maze_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".maze")
}

/// Resolve the path to the settings file (`~/.maze/settings.json`).
pub fn settings_path() -> PathBuf {
    maze_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<MazeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a malformed one is an error.
pub fn load_settings_from_path(path: &Path) -> Result<MazeSettings> {
    let defaults = serde_json::to_value(MazeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: MazeSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Values that fail to parse or fall outside their range are ignored with a
/// warning, leaving the file/default value in place.
pub fn apply_env_overrides(settings: &mut MazeSettings) {
    if let Some(v) = read_env_string("MAZE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("MAZE_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_u64("MAZE_IDLE_TIMEOUT_MS", 100, 86_400_000) {
        settings.server.idle_timeout_ms = v;
    }
    if let Some(v) = read_env_u64("MAZE_SEND_TIMEOUT_MS", 100, 600_000) {
        settings.server.send_timeout_ms = v;
    }
    if let Some(v) = read_env_usize("MAZE_MAX_SEND_QUEUE", 2, 65_536) {
        settings.server.max_send_queue = v;
    }
    if let Some(v) = read_env_string("MAZE_PUBLIC_URL") {
        settings.server.public_url = Some(v);
    }
    if let Some(v) = read_env_string("MAZE_DATABASE_PATH") {
        settings.storage.database_path = v;
    }
    if let Some(v) = read_env_string("MAZE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("MAZE_LOG_JSON") {
        settings.logging.json = v;
    }
}

/// Constraints the file layer cannot express through types alone.
pub fn validate(settings: &MazeSettings) -> Result<()> {
    if settings.server.idle_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "server.idle_timeout_ms must be greater than 0".into(),
        ));
    }
    if settings.server.send_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "server.send_timeout_ms must be greater than 0".into(),
        ));
    }
    // Attach enqueues two frames before the writer runs.
    if settings.server.max_send_queue < 2 {
        return Err(SettingsError::InvalidValue(
            "server.max_send_queue must be at least 2".into(),
        ));
    }
    if settings.storage.database_path.trim().is_empty() {
        return Err(SettingsError::InvalidValue(
            "storage.database_path must not be empty".into(),
        ));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({
            "server": {"port": 8000, "host": "0.0.0.0"}
        });
        let source = serde_json::json!({
            "server": {"port": 9090}
        });
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_maps_key_by_key() {
        let target = serde_json::json!({"modules": {"maze_engine": "debug"}});
        let source = serde_json::json!({"modules": {"maze_store": "warn"}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["modules"]["maze_engine"], "debug");
        assert_eq!(merged["modules"]["maze_store"], "warn");
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server.idle_timeout_ms, 60_000);
        assert_eq!(settings.server.send_timeout_ms, 5_000);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"idle_timeout_ms": 1500}, "storage": {"database_path": ":memory:"}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.server.idle_timeout_ms, 1500);
        assert!(settings.storage.is_in_memory());
        assert_eq!(settings.server.max_send_queue, 256);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_zero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"send_timeout_ms": 0}}"#).unwrap();

        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(msg) if msg.contains("send_timeout_ms")));
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "on", "TRUE"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "OFF"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("9090", 0, 65535), Some(9090));
        assert_eq!(parse_u16_range("99999", 0, 65535), None);
        assert_eq!(parse_u64_range("50", 100, 1000), None);
        assert_eq!(parse_u64_range("abc", 100, 1000), None);
        assert_eq!(parse_usize_range("0", 1, 10), None);
        assert_eq!(parse_usize_range("10", 1, 10), Some(10));
    }
}
