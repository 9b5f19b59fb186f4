//! Headless mode - NDJSON event output for scripts and dashboards
//!
//! `scrapemon watch` reads wire frames from stdin and writes one JSON event
//! per line to stdout. Each event has an "event" field naming its type.
//!
//! # Example Output
//!
//! ```json
//! {"event":"log","id":"m1","level":"info","channel":"main","name":"show_log_text","message":"scanning","timestamp":1704700001000}
//! {"event":"progress","processed":3,"total":10,"percent":30,"timestamp":1704700002000}
//! {"event":"result","outcome":"failure","id":0,"source_path":"/a/b.mp4","label":"ABC-001","error":"no match","timestamp":1704700003000}
//! ```

pub mod runner;

use chrono::Utc;
use serde::Serialize;
use std::io::{self, Write};
use tracing::error;

use scrapemon_app::{Counters, ResultItem, ScrapeStatus};
use scrapemon_core::ClassifiedRecord;

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// One classified log record
    Log {
        id: String,
        level: String,
        channel: String,
        name: String,
        message: String,
        timestamp: i64,
    },

    /// Progress counters changed
    Progress {
        processed: u64,
        total: u64,
        percent: u32,
        timestamp: i64,
    },

    /// A work item finished
    Result {
        outcome: String,
        id: u64,
        source_path: String,
        label: String,
        error: Option<String>,
        timestamp: i64,
    },

    /// Session status or status line changed
    Status {
        status: String,
        text: String,
        timestamp: i64,
    },

    /// Error occurred
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        // Write to stdout with newline (NDJSON format)
        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }

        // Flush to ensure immediate output
        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn log(record: &ClassifiedRecord) -> Self {
        Self::Log {
            id: record.id.clone(),
            level: record.level.as_str().to_string(),
            channel: record.channel.as_str().to_string(),
            name: record.logical_name().to_string(),
            message: record.text.clone(),
            timestamp: record.timestamp.timestamp_millis(),
        }
    }

    pub fn progress(counters: &Counters) -> Self {
        Self::Progress {
            processed: counters.processed,
            total: counters.total,
            percent: counters.percent,
            timestamp: Self::now(),
        }
    }

    pub fn result(item: &ResultItem, success: bool) -> Self {
        Self::Result {
            outcome: if success { "success" } else { "failure" }.to_string(),
            id: item.id,
            source_path: item.source_path.clone(),
            label: item.label.clone(),
            error: item.error_text.clone(),
            timestamp: item.received_at.timestamp_millis(),
        }
    }

    pub fn status(status: ScrapeStatus, text: &str) -> Self {
        Self::Status {
            status: status.as_str().to_string(),
            text: text.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }
}
