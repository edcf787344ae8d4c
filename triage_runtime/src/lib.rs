//! Triage runtime layer - configuration and logging.
//!
//! Binaries call [`init_tracing`] once at startup and build the coordinator
//! from a [`RuntimeConfig`].

pub mod config;

pub use config::{ConfigError, RuntimeConfig};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter.
pub fn init_tracing(config: &RuntimeConfig) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialise tracing: {}", e))?;
    Ok(())
}

/// Version of the runtime crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
