//! Why a settings load was refused.

use std::path::PathBuf;

/// Settings failures. Each one stops the relay before it binds.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read settings file {}: {source}", path.display())]
    Unreadable {
        /// File that was being read.
        path: PathBuf,
        /// Underlying filesystem error.
        source: std::io::Error,
    },
    /// The settings file is not JSON, or a field has the wrong type.
    #[error("malformed settings file {}: {source}", path.display())]
    Malformed {
        /// File that was being parsed.
        path: PathBuf,
        /// Underlying parse error.
        source: serde_json::Error,
    },
    /// A field parsed but holds a value the relay cannot run with.
    #[error("{field}: {reason}")]
    Invalid {
        /// camelCase path of the field, e.g. `room.mailboxCapacity`.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
