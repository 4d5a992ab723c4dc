//! # vox-logging
//!
//! Structured logging with `tracing`.
//!
//! [`init_subscriber`] installs a global subscriber writing to stderr, either
//! compact human-readable lines or newline-delimited JSON. `RUST_LOG` takes
//! precedence over the configured level.

#![deny(unsafe_code)]

pub mod types;

pub use types::LogLevel;

use tracing_subscriber::EnvFilter;
use vox_settings::LoggingSettings;

/// Build the filter: `RUST_LOG` if set and valid, else `fallback`.
pub fn build_filter(fallback: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback.as_directive()))
}

/// Initialize the global tracing subscriber.
///
/// Call once at application startup. Subsequent calls are no-ops. Returns the
/// level used when `RUST_LOG` is unset; an unrecognised level means `info`.
pub fn init_subscriber(settings: &LoggingSettings) -> LogLevel {
    let level = LogLevel::from_str_lossy(&settings.level);
    let filter = build_filter(level);

    // try_init is a no-op if a global subscriber is already set
    if settings.json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    }
    level
}
