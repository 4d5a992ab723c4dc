//! # vox-core
//!
//! Shared vocabulary for the vox relay crates.
//!
//! - **Connection IDs**: [`ConnectionId`], a newtype over a prefixed UUID v7
//! - **Wire envelopes**: [`ServerMessage`] text frames pushed to clients

#![deny(unsafe_code)]

pub mod ids;
pub mod protocol;

pub use ids::ConnectionId;
pub use protocol::ServerMessage;
