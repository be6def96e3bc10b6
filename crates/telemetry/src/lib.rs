//! Logging and tracing bootstrap for the bookshelf service.

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

use bookshelf_kernel::settings::{LogFormat, TelemetrySettings};

/// Install the global tracing subscriber.
///
/// The filter honors `RUST_LOG` when set and falls back to the configured
/// default. The formatter is selected by `telemetry.log_format`.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.filter.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match settings.log_format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;

    tracing::debug!(format = ?settings.log_format, "telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_not_reentrant() {
        let settings = TelemetrySettings::default();
        // First call installs the global subscriber, second must fail cleanly.
        let first = init(&settings);
        let second = init(&settings);
        assert!(first.is_ok() || second.is_err());
    }
}
