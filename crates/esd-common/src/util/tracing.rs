use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{EsdError, EsdResult};
use crate::settings::{LogFormat, ObservabilityConfig};

/// Install the global subscriber. `RUST_LOG` wins over the configured level
/// when it is set.
pub fn setup_tracing(config: &ObservabilityConfig) -> EsdResult {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Full => registry.with(fmt::layer()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    };

    installed.map_err(|e| EsdError::Tracing(e.to_string()))
}
