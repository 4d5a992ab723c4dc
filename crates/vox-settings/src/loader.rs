//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`VoxSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `VOX_*` environment variable overrides
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{StoreBackend, VoxSettings};

/// Resolve the relay's home directory (`~/.vox`).
pub fn vox_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".vox")
}

/// Resolve the path to the settings file (`~/.vox/settings.json`).
pub fn settings_path() -> PathBuf {
    vox_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<VoxSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a value that fails
/// [`VoxSettings::validate`] is an error.
pub fn load_settings_from_path(path: &Path) -> Result<VoxSettings> {
    let mut settings = read_layered(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_layered(path: &Path) -> Result<VoxSettings> {
    let malformed = |source| SettingsError::Malformed {
        path: path.to_owned(),
        source,
    };
    let defaults = serde_json::to_value(VoxSettings::default()).map_err(malformed)?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Unreadable {
            path: path.to_owned(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(malformed)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    serde_json::from_value(merged).map_err(malformed)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `VOX_*` environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (file/default value wins).
pub fn apply_env_overrides(settings: &mut VoxSettings) {
    apply_overrides_with(settings, &|name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// | variable                      | field                                |
/// |-------------------------------|--------------------------------------|
/// | `VOX_HOST`                    | `server.host`                        |
/// | `VOX_PORT`                    | `server.port` (0..=65535)            |
/// | `VOX_SHUTDOWN_GRACE_MS`       | `server.shutdownGraceMs` (≤ 60 000)  |
/// | `VOX_LISTENER_TIMEOUT_MS`     | `server.listenerShutdownTimeoutMs`   |
/// | `VOX_DRAIN_TIMEOUT_MS`        | `server.drainTimeoutMs` (10..=60 000)|
/// | `VOX_MAX_MESSAGE_BYTES`       | `server.maxMessageBytes`             |
/// | `VOX_MAILBOX_CAPACITY`        | `room.mailboxCapacity` (1..=65 536)  |
/// | `VOX_STORE_BACKEND`           | `store.backend` (`sqlite`/`memory`)  |
/// | `VOX_STORE_PATH`              | `store.path`                         |
/// | `VOX_LOG_LEVEL`               | `logging.level`                      |
/// | `VOX_LOG_JSON`                | `logging.json`                       |
pub fn apply_overrides_with(settings: &mut VoxSettings, lookup: &dyn Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("VOX_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("VOX_PORT", 0, u16::MAX) {
        settings.server.port = v;
    }
    if let Some(v) = env.u64("VOX_SHUTDOWN_GRACE_MS", 0, 60_000) {
        settings.server.shutdown_grace_ms = v;
    }
    if let Some(v) = env.u64("VOX_LISTENER_TIMEOUT_MS", 100, 600_000) {
        settings.server.listener_shutdown_timeout_ms = v;
    }
    if let Some(v) = env.u64("VOX_DRAIN_TIMEOUT_MS", 10, 60_000) {
        settings.server.drain_timeout_ms = v;
    }
    if let Some(v) = env.usize("VOX_MAX_MESSAGE_BYTES", 1024, 64 * 1024 * 1024) {
        settings.server.max_message_bytes = v;
    }

    // ── Room ────────────────────────────────────────────────────────
    if let Some(v) = env.usize("VOX_MAILBOX_CAPACITY", 1, 65_536) {
        settings.room.mailbox_capacity = v;
    }

    // ── Store ───────────────────────────────────────────────────────
    if let Some(v) = env.string("VOX_STORE_BACKEND") {
        match parse_backend(&v) {
            Some(backend) => settings.store.backend = backend,
            None => tracing::warn!(key = "VOX_STORE_BACKEND", value = %v, "unknown store backend, ignoring"),
        }
    }
    if let Some(v) = env.string("VOX_STORE_PATH") {
        settings.store.path = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("VOX_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("VOX_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a store backend name.
pub fn parse_backend(val: &str) -> Option<StoreBackend> {
    match val.to_lowercase().as_str() {
        "sqlite" => Some(StoreBackend::Sqlite),
        "memory" => Some(StoreBackend::Memory),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Variable readers (thin wrappers) ────────────────────────────────────────

struct EnvReader<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl EnvReader<'_> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, kind: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let val = (self.lookup)(name)?;
        let result = parse(val.as_str());
        if result.is_none() {
            tracing::warn!(key = name, value = %val, kind, "invalid env var, ignoring");
        }
        result
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.parsed(name, "bool", parse_bool)
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        self.parsed(name, "u16", |v| parse_u16_range(v, min, max))
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.parsed(name, "u64", |v| parse_u64_range(v, min, max))
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.parsed(name, "usize", |v| parse_usize_range(v, min, max))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
