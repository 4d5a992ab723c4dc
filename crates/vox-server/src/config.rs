//! Server configuration.

use std::time::Duration;

use vox_settings::VoxSettings;

use crate::lifecycle::ShutdownPlan;

/// Configuration for the relay server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Pending frames per connection before eviction.
    pub mailbox_capacity: usize,
    /// Max inbound websocket message size in bytes.
    pub max_message_size: usize,
    /// Pause between closing mailboxes and stopping the listener.
    pub shutdown_grace: Duration,
    /// Bound on listener shutdown.
    pub listener_shutdown_timeout: Duration,
    /// Per-write bound on a closing connection's outbound drain.
    pub drain_timeout: Duration,
}

impl ServerConfig {
    /// Derive a server config from loaded settings.
    pub fn from_settings(settings: &VoxSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            mailbox_capacity: settings.room.mailbox_capacity,
            max_message_size: settings.server.max_message_bytes,
            shutdown_grace: settings.server.shutdown_grace(),
            listener_shutdown_timeout: settings.server.listener_shutdown_timeout(),
            drain_timeout: settings.server.drain_timeout(),
        }
    }

    /// Timing for the shutdown sequence.
    pub fn shutdown_plan(&self) -> ShutdownPlan {
        ShutdownPlan {
            grace: self.shutdown_grace,
            listener_timeout: self.listener_shutdown_timeout,
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            mailbox_capacity: 256,
            max_message_size: 1024 * 1024,
            shutdown_grace: Duration::from_secs(2),
            listener_shutdown_timeout: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_ephemeral() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn default_mailbox_capacity() {
        assert_eq!(ServerConfig::default().mailbox_capacity, 256);
    }

    #[test]
    fn default_shutdown_plan() {
        assert_eq!(ServerConfig::default().shutdown_plan(), ShutdownPlan::default());
    }

    #[test]
    fn from_settings_copies_fields() {
        let mut settings = VoxSettings::default();
        settings.server.port = 9999;
        settings.server.shutdown_grace_ms = 100;
        settings.room.mailbox_capacity = 16;
        settings.server.drain_timeout_ms = 40;
        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 9999);
        assert_eq!(cfg.mailbox_capacity, 16);
        assert_eq!(cfg.shutdown_grace, Duration::from_millis(100));
        assert_eq!(cfg.listener_shutdown_timeout, Duration::from_secs(5));
        assert_eq!(cfg.drain_timeout, Duration::from_millis(40));
    }
}
