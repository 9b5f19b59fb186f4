//! Core domain type definitions

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::envelope::{Envelope, SignalName};

/// Timestamp format used for exported and displayed lines
pub const EXPORT_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Info,
        LogLevel::Success,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Debug => "debug",
        }
    }

    /// Upper-case label used in exported lines
    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown log level: {s}"))
    }
}

/// Logical log partition, independent of the transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogChannel {
    Main,
    Request,
}

impl LogChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogChannel::Main => "main",
            LogChannel::Request => "request",
        }
    }
}

impl FromStr for LogChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" => Ok(LogChannel::Main),
            "request" => Ok(LogChannel::Request),
            _ => Err(format!("unknown log channel: {s}")),
        }
    }
}

/// Level axis of the log filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelFilter {
    #[default]
    All,
    Only(LogLevel),
}

impl LevelFilter {
    pub fn matches(&self, level: LogLevel) -> bool {
        match self {
            LevelFilter::All => true,
            LevelFilter::Only(wanted) => *wanted == level,
        }
    }
}

impl FromStr for LevelFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(LevelFilter::All);
        }
        s.parse().map(LevelFilter::Only)
    }
}

/// Channel axis of the log filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelFilter {
    #[default]
    All,
    Only(LogChannel),
}

impl ChannelFilter {
    pub fn matches(&self, channel: LogChannel) -> bool {
        match self {
            ChannelFilter::All => true,
            ChannelFilter::Only(wanted) => *wanted == channel,
        }
    }
}

impl FromStr for ChannelFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(ChannelFilter::All);
        }
        s.parse().map(ChannelFilter::Only)
    }
}

/// An envelope normalized into level, channel and renderable text
///
/// Never mutated after creation; filters are projections over these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedRecord {
    /// Same as the envelope's message id
    pub id: String,
    pub timestamp: DateTime<Local>,
    pub channel: LogChannel,
    pub level: LogLevel,
    pub signal: SignalName,
    pub text: String,
    #[serde(skip)]
    pub envelope: Envelope,
}

impl ClassifiedRecord {
    pub fn logical_name(&self) -> &str {
        self.signal.as_str()
    }

    /// Case-insensitive substring match on text or logical name
    ///
    /// `needle` must already be lower-cased.
    pub fn contains_lowercase(&self, needle: &str) -> bool {
        self.text.to_lowercase().contains(needle)
            || self.logical_name().to_lowercase().contains(needle)
    }

    /// Single export line: `[time] [LEVEL] [name] text`
    pub fn export_line(&self) -> String {
        format!(
            "[{}] [{}] [{}] {}",
            self.timestamp.format(EXPORT_TIME_FORMAT),
            self.level.label(),
            self.logical_name(),
            self.text
        )
    }
}

/// Reduced projection of a record from one of the failure signals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureItem {
    pub id: String,
    pub timestamp: DateTime<Local>,
    pub text: String,
}

impl FailureItem {
    pub fn export_line(&self) -> String {
        format!("[{}] {}", self.timestamp.format(EXPORT_TIME_FORMAT), self.text)
    }
}

impl From<&ClassifiedRecord> for FailureItem {
    fn from(record: &ClassifiedRecord) -> Self {
        Self {
            id: record.id.clone(),
            timestamp: record.timestamp,
            text: record.text.clone(),
        }
    }
}

/// Current filter state of the log store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub search_text: String,
    pub level: LevelFilter,
    pub channel: ChannelFilter,
}

impl LogFilter {
    /// Check if any axis narrows the view
    pub fn is_active(&self) -> bool {
        !self.search_text.is_empty()
            || self.level != LevelFilter::All
            || self.channel != ChannelFilter::All
    }

    /// Merge a partial update into this filter
    pub fn apply(&mut self, update: FilterUpdate) {
        if let Some(search_text) = update.search_text {
            self.search_text = search_text;
        }
        if let Some(level) = update.level {
            self.level = level;
        }
        if let Some(channel) = update.channel {
            self.channel = channel;
        }
    }

    /// Level and search axes only; the channel is chosen by the caller
    pub fn matches_ignoring_channel(&self, record: &ClassifiedRecord) -> bool {
        if !self.level.matches(record.level) {
            return false;
        }
        if self.search_text.is_empty() {
            return true;
        }
        record.contains_lowercase(&self.search_text.to_lowercase())
    }

    pub fn matches(&self, record: &ClassifiedRecord) -> bool {
        self.channel.matches(record.channel) && self.matches_ignoring_channel(record)
    }
}

/// Partial filter change; `None` leaves an axis untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterUpdate {
    pub search_text: Option<String>,
    pub level: Option<LevelFilter>,
    pub channel: Option<ChannelFilter>,
}

impl FilterUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search_text = Some(text.into());
        self
    }

    pub fn level(mut self, level: LevelFilter) -> Self {
        self.level = Some(level);
        self
    }

    pub fn channel(mut self, channel: ChannelFilter) -> Self {
        self.channel = Some(channel);
        self
    }
}
