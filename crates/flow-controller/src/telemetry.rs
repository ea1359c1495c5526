//! Logging initialisation

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Returns `false` if a
/// subscriber was already installed, which leaves that subscriber in place.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_target(false))
            .try_init()
            .is_ok()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init().is_ok()
    };

    if installed {
        tracing::debug!(
            level = %config.level,
            json = config.json,
            version = env!("CARGO_PKG_VERSION"),
            "Tracing initialised"
        );
    }
    installed
}
