// src/telemetry.rs
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogFormat;

pub const DEFAULT_FILTER: &str = "livestock_feed=info,warn";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over [`DEFAULT_FILTER`]. Calling this twice is harmless;
/// the second call keeps the first subscriber.
pub fn init(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let res = match format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init(),
    };

    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
