use syncloop_domain::LogFormat;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "info";

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` overrides the default `info` filter. Returns `false` if a
/// global subscriber was already installed, in which case nothing changes.
pub fn init_logging(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = match format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };

    match result {
        Ok(()) => {
            tracing::debug!(format = %format, "Logging initialised");
            true
        }
        Err(_) => false,
    }
}
