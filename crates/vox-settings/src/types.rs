//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a partial
//! JSON file only needs the keys it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the relay.
///
/// ```json
/// {
///   "server": { "port": 9090 },
///   "room": { "mailboxCapacity": 512 },
///   "store": { "backend": "memory" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoxSettings {
    /// Listener and shutdown timing.
    pub server: ServerSettings,
    /// Room and mailbox sizing.
    pub room: RoomSettings,
    /// Presence store selection.
    pub store: StoreSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl VoxSettings {
    /// Reject values that would make the relay unusable.
    pub fn validate(&self) -> Result<()> {
        if self.room.mailbox_capacity == 0 {
            return Err(SettingsError::Invalid {
                field: "room.mailboxCapacity",
                reason: "must be at least 1",
            });
        }
        if self.server.listener_shutdown_timeout_ms == 0 {
            return Err(SettingsError::Invalid {
                field: "server.listenerShutdownTimeoutMs",
                reason: "must be at least 1",
            });
        }
        if self.server.drain_timeout_ms == 0 {
            return Err(SettingsError::Invalid {
                field: "server.drainTimeoutMs",
                reason: "must be at least 1",
            });
        }
        if self.store.backend == StoreBackend::Sqlite && self.store.path.trim().is_empty() {
            return Err(SettingsError::Invalid {
                field: "store.path",
                reason: "is required for the sqlite backend",
            });
        }
        Ok(())
    }
}

/// Network listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (0 picks an ephemeral port).
    pub port: u16,
    /// Pause between closing every mailbox and stopping the listener.
    pub shutdown_grace_ms: u64,
    /// Upper bound on listener shutdown; exceeding it is fatal.
    pub listener_shutdown_timeout_ms: u64,
    /// How long a closing connection's peer may take to accept each write
    /// before the connection is dropped.
    pub drain_timeout_ms: u64,
    /// Largest inbound websocket message accepted, in bytes.
    pub max_message_bytes: usize,
}

impl ServerSettings {
    /// Grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Listener shutdown bound as a [`Duration`].
    pub fn listener_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.listener_shutdown_timeout_ms)
    }

    /// Per-write drain bound as a [`Duration`].
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_grace_ms: 2_000,
            listener_shutdown_timeout_ms: 5_000,
            drain_timeout_ms: 1_000,
            max_message_bytes: 1024 * 1024,
        }
    }
}

/// Room settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettings {
    /// Pending frames a connection may queue before it is evicted.
    pub mailbox_capacity: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
        }
    }
}

/// Which presence store implementation to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// `SQLite` file on disk.
    #[default]
    Sqlite,
    /// Process-local, lost on restart.
    Memory,
}

/// Presence store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Backend selection.
    pub backend: StoreBackend,
    /// Database path. Relative paths resolve against `~/.vox`.
    pub path: String,
}

impl StoreSettings {
    /// Resolve [`Self::path`] against `base` unless it is already absolute.
    pub fn resolved_path(&self, base: &Path) -> PathBuf {
        let path = Path::new(&self.path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: "presence.db".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Level (`trace` to `error`) used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit newline-delimited JSON instead of human-readable lines.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.port, 8080);
        assert_eq!(s.shutdown_grace(), Duration::from_secs(2));
        assert_eq!(s.listener_shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(s.drain_timeout(), Duration::from_secs(1));
        assert_eq!(s.max_message_bytes, 1_048_576);
    }

    #[test]
    fn logging_defaults() {
        let l = LoggingSettings::default();
        assert_eq!(l.level, "info");
        assert!(!l.json);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(VoxSettings::default()).unwrap();
        assert_eq!(json["room"]["mailboxCapacity"], 256);
        assert_eq!(json["server"]["shutdownGraceMs"], 2_000);
        assert_eq!(json["server"]["listenerShutdownTimeoutMs"], 5_000);
        assert_eq!(json["store"]["backend"], "sqlite");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: VoxSettings = serde_json::from_str(r#"{"server":{"port":9000}}"#).unwrap();
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.room.mailbox_capacity, 256);
    }

    #[test]
    fn backend_parses_lowercase() {
        let s: StoreSettings = serde_json::from_str(r#"{"backend":"memory"}"#).unwrap();
        assert_eq!(s.backend, StoreBackend::Memory);
        assert_eq!(s.path, "presence.db");
    }

    #[test]
    fn relative_store_path_resolves_against_base() {
        let s = StoreSettings::default();
        assert_eq!(
            s.resolved_path(Path::new("/home/u/.vox")),
            PathBuf::from("/home/u/.vox/presence.db")
        );
    }

    #[test]
    fn absolute_store_path_is_kept() {
        let s = StoreSettings {
            path: "/var/lib/vox/p.db".into(),
            ..StoreSettings::default()
        };
        assert_eq!(
            s.resolved_path(Path::new("/ignored")),
            PathBuf::from("/var/lib/vox/p.db")
        );
    }

    #[test]
    fn zero_mailbox_is_rejected() {
        let mut s = VoxSettings::default();
        s.room.mailbox_capacity = 0;
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("mailboxCapacity"));
    }

    #[test]
    fn empty_sqlite_path_is_rejected() {
        let mut s = VoxSettings::default();
        s.store.path = "  ".into();
        assert!(s.validate().is_err());
        s.store.backend = StoreBackend::Memory;
        assert!(s.validate().is_ok());
    }
}
