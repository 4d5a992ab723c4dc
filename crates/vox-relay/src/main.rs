//! # vox-relay
//!
//! Relay binary: loads settings, opens the presence store, serves the room,
//! and runs the ordered shutdown on ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use vox_server::config::ServerConfig;
use vox_server::server::VoxServer;
use vox_settings::{StoreBackend, VoxSettings};
use vox_store::{MemoryPresenceStore, PresenceStore, SqlitePresenceStore};

/// Single-room audio relay with presence.
#[derive(Parser, Debug)]
#[command(name = "vox-relay", about = "Single-room audio relay with presence")]
struct Cli {
    /// Settings file (defaults to `~/.vox/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the presence database (overrides settings).
    #[arg(long)]
    store_path: Option<PathBuf>,

    /// Keep presence in memory instead of `SQLite`.
    #[arg(long, default_value_t = false)]
    memory_store: bool,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut VoxSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref path) = self.store_path {
            settings.store.path = path.to_string_lossy().into_owned();
        }
        if self.memory_store {
            settings.store.backend = StoreBackend::Memory;
        }
    }
}

fn load(cli: &Cli) -> Result<VoxSettings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(vox_settings::settings_path);
    let mut settings = vox_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn open_store(settings: &VoxSettings) -> Result<Arc<dyn PresenceStore>> {
    match settings.store.backend {
        StoreBackend::Sqlite => {
            let path = settings.store.resolved_path(&vox_settings::vox_home());
            let store = SqlitePresenceStore::open(&path)
                .with_context(|| format!("Failed to open presence store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => Ok(Arc::new(MemoryPresenceStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;

    let level = vox_logging::init_subscriber(&settings.logging);
    tracing::debug!(%level, json = settings.logging.json, "logging initialized");

    let store = open_store(&settings)?;
    store
        .ping()
        .await
        .with_context(|| format!("Presence store ({}) is unreachable", store.backend()))?;
    tracing::info!(backend = store.backend(), "presence store connected");

    let server = VoxServer::new(ServerConfig::from_settings(&settings), store);
    let running = server.start().await.context("Failed to bind server")?;

    tracing::info!("Vox relay listening on ws://{}", running.addr);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let report = server.stop(running).await.context("Shutdown failed")?;

    tracing::info!(
        connections_closed = report.connections_closed,
        store_disconnected = report.store_disconnected,
        "Shutdown complete"
    );
    Ok(())
}
