//! Inbound push messages and their logical signal names

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transport-level type for messages that wrap a named worker signal
pub const QT_SIGNAL_TYPE: &str = "qt_signal";

/// Name used when a frame carries no recognisable signal name
pub const UNKNOWN_SIGNAL: &str = "unknown";

/// Counter for envelopes that arrive without a server-assigned id
static LOCAL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_local_id() -> String {
    format!("local-{}", LOCAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
}

// ─────────────────────────────────────────────────────────
// SignalName
// ─────────────────────────────────────────────────────────

/// Logical name of a push message
///
/// Known names get their own variant; anything else is preserved verbatim in
/// `Unknown` so that new worker signals still flow through the log store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignalName {
    /// Free-text status line under the progress bar
    ScrapeInfo,
    /// Detail snapshot of the media item being scraped
    SetMainInfo,
    /// One finished work item, success or failure
    ShowListName,
    /// Absolute progress counters
    Progress,
    /// Success line for the main log
    ViewSuccessFileSettext,
    LogsFailedSettext,
    LogsFailedShow,
    ViewFailedListSettext,
    /// Verbose request/debug output
    DetailLog,
    /// Network probe output
    NetInfo,
    /// Plain main-log line
    ShowLogText,
    Unknown(String),
}

impl SignalName {
    /// Parse a raw logical name
    pub fn parse(name: &str) -> Self {
        match name {
            "scrape_info" => Self::ScrapeInfo,
            "set_main_info" => Self::SetMainInfo,
            "show_list_name" => Self::ShowListName,
            "progress" => Self::Progress,
            "view_success_file_settext" => Self::ViewSuccessFileSettext,
            "logs_failed_settext" => Self::LogsFailedSettext,
            "logs_failed_show" => Self::LogsFailedShow,
            "view_failed_list_settext" => Self::ViewFailedListSettext,
            "detail_log" => Self::DetailLog,
            "net_info" => Self::NetInfo,
            "show_log_text" => Self::ShowLogText,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The raw logical name as sent by the worker
    pub fn as_str(&self) -> &str {
        match self {
            Self::ScrapeInfo => "scrape_info",
            Self::SetMainInfo => "set_main_info",
            Self::ShowListName => "show_list_name",
            Self::Progress => "progress",
            Self::ViewSuccessFileSettext => "view_success_file_settext",
            Self::LogsFailedSettext => "logs_failed_settext",
            Self::LogsFailedShow => "logs_failed_show",
            Self::ViewFailedListSettext => "view_failed_list_settext",
            Self::DetailLog => "detail_log",
            Self::NetInfo => "net_info",
            Self::ShowLogText => "show_log_text",
            Self::Unknown(name) => name,
        }
    }

    /// Signals routed to the request (verbose) log channel
    pub fn is_request_channel(&self) -> bool {
        matches!(self, Self::DetailLog | Self::NetInfo)
    }

    /// Signals that always mean a successful item
    pub fn is_success_signal(&self) -> bool {
        matches!(self, Self::ViewSuccessFileSettext)
    }

    /// Signals that feed the failure side-list
    pub fn is_failure_signal(&self) -> bool {
        matches!(
            self,
            Self::LogsFailedSettext | Self::LogsFailedShow | Self::ViewFailedListSettext
        )
    }
}

impl From<&str> for SignalName {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<String> for SignalName {
    fn from(name: String) -> Self {
        match Self::parse(&name) {
            Self::Unknown(_) => Self::Unknown(name),
            known => known,
        }
    }
}

impl From<SignalName> for String {
    fn from(name: SignalName) -> Self {
        match name {
            SignalName::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for SignalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────
// Envelope
// ─────────────────────────────────────────────────────────

/// One inbound push message with delivery metadata
///
/// Immutable once received. Decoding from the wire never fails: frames that
/// cannot be understood become `unknown` envelopes carrying the raw text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub message_id: String,
    pub timestamp: DateTime<Local>,
    pub signal: SignalName,
    pub payload: Value,
}

impl Envelope {
    /// Create an envelope stamped now with a locally generated id
    pub fn new(signal: impl Into<SignalName>, payload: impl Into<Value>) -> Self {
        Self {
            message_id: next_local_id(),
            timestamp: Local::now(),
            signal: signal.into(),
            payload: payload.into(),
        }
    }

    pub fn with_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The raw logical name
    pub fn logical_name(&self) -> &str {
        self.signal.as_str()
    }

    /// Decode one text frame from the push channel
    ///
    /// Frames look like `{"type", "message_id", "timestamp", "data"}`. For
    /// `qt_signal` frames the logical name and payload are unwrapped from
    /// `data.name` / `data.data`; any other type is its own logical name.
    pub fn decode(frame: &str) -> Self {
        let value: Value = match serde_json::from_str(frame) {
            Ok(value @ Value::Object(_)) => value,
            _ => return Self::new(UNKNOWN_SIGNAL, frame),
        };

        let message_id = match value.get("message_id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => next_local_id(),
        };
        let timestamp = parse_timestamp(value.get("timestamp")).unwrap_or_else(Local::now);
        let data = value.get("data").cloned().unwrap_or(Value::Null);

        let (signal, payload) = match value.get("type").and_then(Value::as_str) {
            Some(QT_SIGNAL_TYPE) => unwrap_qt_signal(data),
            Some(kind) => (SignalName::parse(kind), data),
            None => (SignalName::parse(UNKNOWN_SIGNAL), data),
        };

        Self {
            message_id,
            timestamp,
            signal,
            payload,
        }
    }
}

/// Split a `qt_signal` body into its name and inner payload
fn unwrap_qt_signal(data: Value) -> (SignalName, Value) {
    match data {
        Value::Object(mut body) => {
            let name = body
                .get("name")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .unwrap_or(UNKNOWN_SIGNAL)
                .to_string();
            let payload = body.remove("data").unwrap_or(Value::Null);
            (SignalName::from(name), payload)
        }
        other => (SignalName::parse(UNKNOWN_SIGNAL), other),
    }
}

/// Parse a wire timestamp
///
/// Accepts RFC 3339, naive ISO-8601 (taken as local time) and epoch
/// milliseconds.
fn parse_timestamp(raw: Option<&Value>) -> Option<DateTime<Local>> {
    match raw? {
        Value::String(text) => {
            if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
                return Some(ts.with_timezone(&Local));
            }
            let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
                .ok()?;
            Local.from_local_datetime(&naive).earliest()
        }
        Value::Number(n) => {
            let millis = n.as_i64()?;
            DateTime::from_timestamp_millis(millis).map(|ts| ts.with_timezone(&Local))
        }
        _ => None,
    }
}
