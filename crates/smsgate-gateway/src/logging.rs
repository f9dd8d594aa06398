//! Tracing subscriber setup.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingSection};

/// Install the global subscriber. `RUST_LOG` wins over `logging.filter`.
/// A second call is a no-op.
pub fn init(cfg: &LoggingSection) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.filter));
    let _ = match cfg.format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_file(true)
            .with_line_number(true)
            .with_current_span(false)
            .try_init(),
        LogFormat::Pretty => fmt().with_env_filter(filter).try_init(),
    };
}
