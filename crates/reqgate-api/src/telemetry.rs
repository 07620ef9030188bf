//! # Tracing Setup
//!
//! Library crates only emit `tracing` events. The subscriber is installed
//! here, once, by the binary.

use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Error installing the global subscriber (usually: one already exists).
pub type TelemetryError = Box<dyn std::error::Error + Send + Sync>;

/// Install the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(format: LogFormat) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
    }
}
