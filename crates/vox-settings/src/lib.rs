//! # vox-settings
//!
//! Configuration for the vox relay, loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`VoxSettings::default()`]
//! 2. **User file**: `~/.vox/settings.json`, deep-merged over defaults
//! 3. **Environment variables**: `VOX_*` overrides (highest priority)
//!
//! The binary applies its command-line flags on top of the loaded value.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path, vox_home};
pub use types::*;
