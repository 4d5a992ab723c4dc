//! `VoxServer`: Axum HTTP + WebSocket relay.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::get;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;
use vox_store::PresenceStore;

use crate::config::ServerConfig;
use crate::handlers;
use crate::lifecycle::{LifecycleError, RunningTasks, ShutdownCoordinator, ShutdownReport};
use crate::notifier::PresenceNotifier;
use crate::room::{MembershipChange, Room};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The single room.
    pub room: Arc<Room>,
    /// Presence store for `/join` and `/leave`.
    pub store: Arc<dyn PresenceStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
}

/// A started server: bound address plus its background tasks.
pub struct RunningServer {
    /// Address the listener bound to.
    pub addr: SocketAddr,
    /// Listener and notifier tasks, consumed by [`VoxServer::stop`].
    pub tasks: RunningTasks,
}

/// The relay server.
pub struct VoxServer {
    config: Arc<ServerConfig>,
    room: Arc<Room>,
    store: Arc<dyn PresenceStore>,
    shutdown: Arc<ShutdownCoordinator>,
    changes: Mutex<Option<mpsc::UnboundedReceiver<MembershipChange>>>,
    start_time: Instant,
}

impl VoxServer {
    /// Create a new server around an already-connected presence store.
    pub fn new(config: ServerConfig, store: Arc<dyn PresenceStore>) -> Self {
        let (room, changes) = Room::new();
        Self {
            config: Arc::new(config),
            room: Arc::new(room),
            store,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            changes: Mutex::new(Some(changes)),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            room: self.room.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/ws", get(handlers::ws_handler))
            .route("/join", get(handlers::join_handler))
            .route("/leave", get(handlers::leave_handler))
            .route("/health", get(handlers::health_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start the presence notifier. Returns `None` if it was already started.
    pub fn spawn_notifier(&self) -> Option<JoinHandle<()>> {
        let changes = self.changes.lock().take()?;
        let notifier = PresenceNotifier::new(
            self.room.clone(),
            self.store.clone(),
            changes,
            self.shutdown.token(),
        );
        Some(tokio::spawn(notifier.run()))
    }

    /// Bind the listener and serve until the shutdown token fires.
    pub async fn listen(&self) -> io::Result<(SocketAddr, JoinHandle<io::Result<()>>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
        });

        info!(%addr, "listening");
        Ok((addr, handle))
    }

    /// Start the notifier, then the listener.
    pub async fn start(&self) -> io::Result<RunningServer> {
        let notifier = self
            .spawn_notifier()
            .ok_or_else(|| io::Error::other("server already started"))?;
        let (addr, listener) = match self.listen().await {
            Ok(bound) => bound,
            Err(e) => {
                notifier.abort();
                return Err(e);
            }
        };
        Ok(RunningServer {
            addr,
            tasks: RunningTasks { listener, notifier },
        })
    }

    /// Run the ordered shutdown sequence against a started server.
    pub async fn stop(&self, running: RunningServer) -> Result<ShutdownReport, LifecycleError> {
        info!(addr = %running.addr, "shutting down");
        self.shutdown
            .drain(
                &self.room,
                self.store.as_ref(),
                running.tasks,
                self.config.shutdown_plan(),
            )
            .await
    }

    /// Get the room.
    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }

    /// Get the presence store.
    pub fn store(&self) -> &Arc<dyn PresenceStore> {
        &self.store
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
