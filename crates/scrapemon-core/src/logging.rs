//! File logging through tracing
//!
//! stdout belongs to the CLI output (exports, NDJSON events), so all
//! diagnostics go to a daily-rolling file instead.

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Environment variable controlling the log filter
pub const LOG_ENV_VAR: &str = "SCRAPEMON_LOG";

/// Filter used when `SCRAPEMON_LOG` is unset or invalid
///
/// Target matching is by prefix, so `scrapemon` covers every workspace crate.
pub const DEFAULT_FILTER: &str = "scrapemon=info,warn";

const LOG_FILE_PREFIX: &str = "scrapemon.log";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Install the global subscriber
///
/// ```bash
/// SCRAPEMON_LOG=debug scrapemon watch
/// SCRAPEMON_LOG=scrapemon_app::fanout=trace scrapemon replay capture.jsonl
/// ```
pub fn init() -> Result<()> {
    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(TIMESTAMP_FORMAT.to_string())),
        )
        .init();

    tracing::info!("scrapemon {} logging to {}", env!("CARGO_PKG_VERSION"), log_dir.display());
    Ok(())
}

/// `<data_local_dir>/scrapemon/logs`, or `./scrapemon/logs` without a home
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scrapemon")
        .join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory_is_scoped_to_scrapemon() {
        assert!(log_directory().ends_with("scrapemon/logs"));
    }

    #[test]
    fn test_default_filter_parses() {
        let filter = EnvFilter::try_new(DEFAULT_FILTER);
        assert!(filter.is_ok());
    }
}
