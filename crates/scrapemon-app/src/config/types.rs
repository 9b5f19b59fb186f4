//! Configuration type definitions

use serde::{Deserialize, Serialize};

use crate::log_store::{MAX_FAILURES, MAX_LOGS};

/// Application settings (.scrapemon/config.toml)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub logs: LogSettings,
}

/// Log store settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogSettings {
    /// Records retained before the oldest is evicted
    #[serde(default = "default_max_logs")]
    pub max_logs: usize,

    /// Failure items retained, independent of `max_logs`
    #[serde(default = "default_max_failures")]
    pub max_failures: usize,

    /// Also keep `progress` envelopes in the log
    #[serde(default)]
    pub record_progress: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            max_logs: default_max_logs(),
            max_failures: default_max_failures(),
            record_progress: false,
        }
    }
}

fn default_max_logs() -> usize {
    MAX_LOGS
}

fn default_max_failures() -> usize {
    MAX_FAILURES
}
