//! Logging initialization.
//!
//! The library itself only emits `tracing` events. Binaries and tests that
//! want output install a subscriber here.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install a fmt subscriber built from `config`.
///
/// `RUST_LOG` overrides the configured level. Returns `false` when a global
/// subscriber was already installed, so calling this twice is harmless.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_lowercase()));

    let installed = if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
    };

    if installed.is_ok() {
        tracing::debug!(app = %config.app_name, "Logging initialized");
    }
    installed.is_ok()
}
