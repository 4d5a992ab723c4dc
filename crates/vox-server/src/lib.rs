//! # vox-server
//!
//! Single-room realtime audio relay.
//!
//! - [`room::Room`]: membership registry, join/leave, fan-out with eviction
//! - [`connection::Connection`]: per-client identity, bounded mailbox, lifecycle state
//! - [`pump`]: inbound (socket → room) and outbound (mailbox → socket) workers
//! - [`notifier::PresenceNotifier`]: pushes `userUpdate` snapshots on membership change
//! - [`lifecycle::ShutdownCoordinator`]: ordered graceful shutdown
//! - [`server::VoxServer`]: Axum router for `/ws`, `/join`, `/leave`, `/health`

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod health;
pub mod lifecycle;
pub mod mailbox;
pub mod notifier;
pub mod pump;
pub mod room;
pub mod server;
pub mod session;
